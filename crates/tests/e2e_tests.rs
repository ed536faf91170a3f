//! End to end tests
#[cfg(test)]
mod e2e {
    use particle_field::canvas::PixelCanvas;
    use particle_field::engine::Engine;
    use particle_field::scheduler::ManualScheduler;
    use particle_field::settings::{PartialSettings, Settings};
    use particle_field::surface::Surface as _;
    use rand::SeedableRng as _;

    fn partial(json: &str) -> PartialSettings {
        serde_json::from_str(json).unwrap()
    }

    fn start(json: &str, seed: u64) -> (Engine<ManualScheduler>, PixelCanvas) {
        let settings = Settings::from_partial(&partial(json));
        let mut canvas = PixelCanvas::new(120, 80);
        let mut engine = Engine::with_rng(
            settings,
            ManualScheduler::new(),
            rand::rngs::StdRng::seed_from_u64(seed),
        );
        engine.mount(&mut canvas);
        (engine, canvas)
    }

    /// Run every frame that has been requested, as if the display had refreshed.
    fn run_frames(engine: &mut Engine<ManualScheduler>, canvas: &mut PixelCanvas, frames: usize) {
        for _ in 0..frames {
            let request = engine.scheduler_mut().take_due().unwrap();
            assert!(engine.on_frame(request, canvas));
        }
    }

    fn painted_pixels(canvas: &PixelCanvas) -> Vec<(u32, u32)> {
        canvas
            .image()
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel.0[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn full_lifecycle() {
        let (mut engine, mut canvas) = start(r#"{ "particle": { "count": 10 } }"#, 1);
        assert_eq!((canvas.width(), canvas.height()), (120, 80));
        assert_eq!(engine.particles().len(), 10);

        run_frames(&mut engine, &mut canvas, 30);
        assert!(!painted_pixels(&canvas).is_empty());

        engine.update_settings(&partial(r#"{ "particle": { "count": 25 } }"#), &mut canvas);
        assert_eq!(engine.particles().len(), 25);
        run_frames(&mut engine, &mut canvas, 30);

        engine.update_settings(&partial(r#"{ "particle": { "count": 0 } }"#), &mut canvas);
        run_frames(&mut engine, &mut canvas, 1);
        assert!(painted_pixels(&canvas).is_empty());

        engine.unmount();
        assert!(engine.scheduler_mut().take_due().is_none());
        assert_eq!(engine.scheduler().requested, 62);
    }

    #[test]
    fn container_resizes_are_followed() {
        let (mut engine, mut canvas) = start("{}", 2);
        canvas.set_container_size(40, 30);
        run_frames(&mut engine, &mut canvas, 1);
        assert_eq!((canvas.width(), canvas.height()), (40, 30));

        engine.update_settings(
            &partial(r#"{ "canvas": { "fillToContainer": false, "width": 90, "height": 60 } }"#),
            &mut canvas,
        );
        assert_eq!((canvas.width(), canvas.height()), (90, 60));
        canvas.set_container_size(10, 10);
        run_frames(&mut engine, &mut canvas, 5);
        assert_eq!((canvas.width(), canvas.height()), (90, 60));
    }

    #[test]
    fn colour_changes_apply_to_every_particle() {
        let (mut engine, mut canvas) = start(
            r#"{ "particle": { "count": 8, "color": "rgb(255, 0, 0)" } }"#,
            3,
        );
        run_frames(&mut engine, &mut canvas, 1);
        for (x, y) in painted_pixels(&canvas) {
            let (red, green, blue, _) = canvas.pixel(x, y).unwrap();
            assert!(red > 0.99 && green < 0.01 && blue < 0.01);
        }

        engine.update_settings(&partial(r#"{ "particle": { "color": "blue" } }"#), &mut canvas);
        run_frames(&mut engine, &mut canvas, 1);
        for (x, y) in painted_pixels(&canvas) {
            let (red, _, blue, _) = canvas.pixel(x, y).unwrap();
            assert!(red < 0.01 && blue > 0.99);
        }
    }

    #[test]
    fn bouncing_particles_stay_on_the_canvas() {
        let (mut engine, mut canvas) = start(
            r#"{
                "canvas": { "bounceOffWalls": true },
                "particle": { "count": 30, "minSize": 1, "maxSize": 3 },
                "velocity": { "minSpeed": 0.5, "maxSpeed": 3 }
            }"#,
            4,
        );
        for _ in 0..500 {
            run_frames(&mut engine, &mut canvas, 1);
            for particle in engine.particles() {
                let reach = particle.size + particle.velocity.abs().max_element();
                assert!(particle.position.x >= -reach && particle.position.x <= 120.0 + reach);
                assert!(particle.position.y >= -reach && particle.position.y <= 80.0 + reach);
            }
        }
    }

    #[test]
    fn fading_particles_are_translucent() {
        let (mut engine, mut canvas) = start(
            r#"{
                "particle": { "count": 1, "maxSize": 20 },
                "velocity": { "maxSpeed": 0 },
                "opacity": { "minOpacity": 0.2, "maxOpacity": 0.4, "transitionTimeMs": 100 }
            }"#,
            5,
        );
        for _ in 0..20 {
            run_frames(&mut engine, &mut canvas, 1);
            let particle = &engine.particles()[0];
            let opacity = particle.opacity.unwrap();
            assert!((0.2..=0.4).contains(&opacity));

            #[expect(
                clippy::as_conversions,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "Tests aren't so strict"
            )]
            let (x, y) = (particle.position.x as u32, particle.position.y as u32);
            let (_, _, _, alpha) = canvas.pixel(x, y).unwrap();
            assert!((alpha - opacity).abs() < 0.01, "{alpha} vs {opacity}");
        }
    }

    #[test]
    fn seeded_engines_are_reproducible() {
        let json = r#"{ "particle": { "count": 20, "minSize": 1 }, "velocity": { "minSpeed": 0.1 } }"#;
        let (mut first, mut first_canvas) = start(json, 6);
        let (mut second, mut second_canvas) = start(json, 6);
        run_frames(&mut first, &mut first_canvas, 50);
        run_frames(&mut second, &mut second_canvas, 50);

        assert_eq!(first.particles(), second.particles());
        assert_eq!(first_canvas.image(), second_canvas.image());
    }

    #[test]
    fn snapshots_can_be_saved() {
        let (mut engine, mut canvas) = start(r#"{ "particle": { "count": 5 } }"#, 7);
        run_frames(&mut engine, &mut canvas, 10);

        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("frame.png");
        canvas.save_png(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
