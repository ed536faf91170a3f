//! The task that owns the particle engine, its canvas and the user's terminal, and keeps them all
//! in step.

use std::sync::Arc;

use color_eyre::eyre::Result;
use particle_field::canvas::PixelCanvas;
use particle_field::engine::Engine;
use particle_field::settings::Settings;
use termwiz::terminal::Terminal as TermwizTerminal;

use crate::config::main::MAX_RESOLUTION;
use crate::renderer::Renderer;
use crate::run::Protocol;
use crate::shared_state::SharedState;
use crate::ticker::FrameTicker;

/// `Animation`
pub(crate) struct Animation<T: TermwizTerminal> {
    /// The particle simulation.
    engine: Engine<FrameTicker>,
    /// The pixels that the engine draws on.
    canvas: PixelCanvas,
    /// The user's terminal.
    renderer: Renderer<T>,
    /// Canvas pixels per terminal pixel, along each axis.
    resolution: u32,
}

impl<T: TermwizTerminal + Send> Animation<T> {
    /// Instantiate, using the current config.
    async fn new(state: &Arc<SharedState>, terminal: T) -> Result<Self> {
        let config = state.config.read().await.clone();
        let settings = Settings::from_partial(&state.partial_settings().await);
        let engine = Engine::new(settings, FrameTicker::new(config.frame_rate));
        let renderer = Renderer::new(terminal)?;

        let mut animation = Self {
            engine,
            canvas: PixelCanvas::new(0, 0),
            renderer,
            resolution: config.resolution.clamp(1, MAX_RESOLUTION),
        };
        animation.update_container_size()?;
        Ok(animation)
    }

    /// The canvas size that exactly covers the terminal.
    fn update_container_size(&mut self) -> Result<()> {
        let (columns, rows) = self.renderer.dimensions();
        let width = u32::try_from(columns)?.saturating_mul(self.resolution);
        let height = u32::try_from(rows)?
            .saturating_mul(2)
            .saturating_mul(self.resolution);
        self.canvas.set_container_size(width, height);
        tracing::debug!("Canvas container is now {width}x{height}");
        Ok(())
    }

    /// Listen for frames and protocol messages.
    async fn run(&mut self, mut protocol_rx: tokio::sync::broadcast::Receiver<Protocol>) -> Result<()> {
        self.engine.mount(&mut self.canvas);

        tracing::debug!("Starting animation loop");
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "`tokio::select! generates this.`"
        )]
        loop {
            tokio::select! {
                Some(request) = self.engine.scheduler_mut().due() => {
                    self.frame(request)?;
                }
                Ok(message) = protocol_rx.recv() => {
                    if matches!(message, Protocol::End) {
                        break;
                    }
                    self.handle_protocol_message(message)?;
                }
            }
        }
        tracing::debug!("Exited animation loop");

        self.engine.unmount();
        Ok(())
    }

    /// Step the engine and show the result.
    fn frame(&mut self, request: particle_field::scheduler::FrameRequest) -> Result<()> {
        if self.renderer.check_for_resize()? {
            self.update_container_size()?;
        }

        self.engine.on_frame(request, &mut self.canvas);
        self.renderer.render(&self.canvas, self.resolution)
    }

    /// Handle messages from the global Drift protocol.
    fn handle_protocol_message(&mut self, message: Protocol) -> Result<()> {
        match message {
            Protocol::Config(config) => {
                self.engine
                    .scheduler_mut()
                    .set_frame_rate(config.frame_rate);
                self.resolution = config.resolution.clamp(1, MAX_RESOLUTION);
                self.update_container_size()?;
            }
            Protocol::Settings(partial) => {
                self.engine.update_settings(&partial, &mut self.canvas);
            }
            Protocol::End => (),
        }

        Ok(())
    }

    /// Give the terminal back to the user.
    fn finish(&mut self) -> Result<()> {
        self.renderer.restore()
    }
}

/// Start the animation task.
pub(crate) fn start(state: Arc<SharedState>) -> tokio::task::JoinHandle<Result<()>> {
    let protocol_tx = state.protocol_tx.clone();
    let protocol_rx = protocol_tx.subscribe();
    tokio::spawn(async move {
        let terminal = match crate::renderer::get_termwiz_terminal() {
            Ok(terminal) => terminal,
            Err(error) => {
                crate::run::broadcast_protocol_end(&protocol_tx);
                return Err(error);
            }
        };

        let mut animation = match Animation::new(&state, terminal).await {
            Ok(animation) => animation,
            Err(error) => {
                crate::run::broadcast_protocol_end(&protocol_tx);
                return Err(error);
            }
        };

        let result = animation.run(protocol_rx).await;
        if result.is_err() {
            crate::run::broadcast_protocol_end(&protocol_tx);
        }

        // The terminal is always restored, even after an error.
        let finish_result = animation.finish();
        result?;
        finish_result
    })
}
