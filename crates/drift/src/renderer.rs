//! Render the particle canvas to the user's terminal

use color_eyre::eyre::Result;
use particle_field::canvas::PixelCanvas;
use termwiz::surface::Change as TermwizChange;
use termwiz::terminal::buffered::BufferedTerminal;
use termwiz::terminal::Terminal as TermwizTerminal;

/// `Renderer`
pub(crate) struct Renderer<T: TermwizTerminal> {
    /// A buffered copy of the user's terminal. Only the differences between frames are actually
    /// written out.
    terminal: BufferedTerminal<T>,
}

impl<T: TermwizTerminal> Renderer<T> {
    /// Take over the user's terminal: raw mode, the alternate screen and a hidden cursor.
    pub fn new(mut terminal: T) -> Result<Self> {
        tracing::debug!("Putting user's terminal into raw mode");
        terminal.set_raw_mode()?;
        terminal.enter_alternate_screen()?;

        let mut buffered = BufferedTerminal::new(terminal)?;
        buffered.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Hidden,
        ));
        buffered.add_change(TermwizChange::ClearScreen(
            termwiz::color::ColorAttribute::Default,
        ));
        buffered.flush()?;

        Ok(Self { terminal: buffered })
    }

    /// The terminal's size in cells.
    pub fn dimensions(&self) -> (usize, usize) {
        self.terminal.dimensions()
    }

    /// Has the user's terminal been resized since the last check?
    pub fn check_for_resize(&mut self) -> Result<bool> {
        let is_resized = self.terminal.check_for_resize()?;
        if is_resized {
            self.terminal.repaint()?;
            tracing::debug!("Terminal resized to {:?}", self.dimensions());
        }
        Ok(is_resized)
    }

    /// Do a single render to the user's actual terminal. It uses a diffing algorithm to make
    /// the minimum number of changes.
    pub fn render(&mut self, canvas: &PixelCanvas, resolution: u32) -> Result<()> {
        let (width, height) = self.dimensions();
        let frame = crate::surface::Surface::from_canvas(canvas, width, height, resolution);
        self.terminal.draw_from_screen(&frame.surface, 0, 0);

        // This is where we actually render to the user's real terminal.
        self.terminal.flush()?;
        Ok(())
    }

    /// Give the user their terminal back just as it was.
    pub fn restore(&mut self) -> Result<()> {
        self.terminal.add_change(TermwizChange::CursorVisibility(
            termwiz::surface::CursorVisibility::Visible,
        ));
        self.terminal.flush()?;

        let terminal = self.terminal.terminal();
        terminal.exit_alternate_screen()?;
        tracing::debug!("Setting user's terminal to cooked mode");
        terminal.set_cooked_mode()?;
        Ok(())
    }
}

/// We need this just because I can't figure out how to pass `Box<dyn Terminal>` to
/// `BufferedTerminal::new()`
pub(crate) fn get_termwiz_terminal() -> Result<impl TermwizTerminal + Send> {
    let capabilities = termwiz::caps::Capabilities::new_from_env()?;
    Ok(termwiz::terminal::new_terminal(capabilities)?)
}
