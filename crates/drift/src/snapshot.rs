//! Render frames without a terminal and save the result as a PNG. Handy for previewing settings,
//! or for running somewhere without a TTY.

use std::sync::Arc;

use color_eyre::eyre::Result;
use particle_field::canvas::PixelCanvas;
use particle_field::engine::Engine;
use particle_field::scheduler::ManualScheduler;
use particle_field::settings::Settings;

use crate::shared_state::SharedState;

/// Render `frames` frames with the current settings and save the last one to `path`.
pub(crate) async fn render(
    state: &Arc<SharedState>,
    frames: u32,
    path: &std::path::Path,
) -> Result<()> {
    let settings = Settings::from_partial(&state.partial_settings().await);
    let canvas = render_frames(settings, frames);
    canvas.save_png(path)?;
    tracing::info!("Saved {frames} frame snapshot to {}", path.display());
    Ok(())
}

/// Run the engine for a number of frames, as fast as possible. Without a terminal to fill, the
/// canvas' container is the configured canvas size.
fn render_frames(settings: Settings, frames: u32) -> PixelCanvas {
    let mut canvas = PixelCanvas::new(settings.canvas.width, settings.canvas.height);
    let mut engine = Engine::new(settings, ManualScheduler::new());
    engine.mount(&mut canvas);

    for _ in 0..frames {
        let Some(request) = engine.scheduler_mut().take_due() else {
            break;
        };
        engine.on_frame(request, &mut canvas);
    }

    engine.unmount();
    canvas
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests aren't so strict")]
mod test {
    use particle_field::surface::Surface as _;

    use super::*;

    fn settings(json: &str) -> Settings {
        Settings::from_partial(&serde_json::from_str(json).unwrap())
    }

    fn painted_pixels(canvas: &PixelCanvas) -> usize {
        canvas
            .image()
            .pixels()
            .filter(|pixel| pixel.0[3] > 0)
            .count()
    }

    #[test]
    fn renders_particles() {
        let canvas = render_frames(
            settings(r#"{ "canvas": { "width": 64, "height": 48 }, "particle": { "count": 5 } }"#),
            3,
        );
        assert_eq!((canvas.width(), canvas.height()), (64, 48));
        assert!(painted_pixels(&canvas) > 0);
    }

    #[test]
    fn no_particles_means_a_blank_canvas() {
        let canvas = render_frames(settings(r#"{ "particle": { "count": 0 } }"#), 3);
        assert_eq!(painted_pixels(&canvas), 0);
    }

    #[tokio::test]
    async fn saves_the_snapshot() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("snapshot.png");
        let state = SharedState::init();
        *state.cli_settings.write().await =
            serde_json::from_str(r#"{ "canvas": { "width": 30, "height": 20 } }"#).unwrap();

        render(&state, 2, &path).await.unwrap();
        assert!(path.exists());
    }
}
