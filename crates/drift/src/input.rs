//! Handle all the raw input directly from the end user.

use std::io::Read as _;

use color_eyre::eyre::Result;
use termwiz::input::{InputEvent, KeyCode, KeyEvent, Modifiers};

/// Bytes from STDIN
pub type BytesFromSTDIN = [u8; 128];

/// Handle input from the user
pub(crate) struct Input {
    /// The main Drift protocol channel.
    protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
}

impl Input {
    /// Start a thread to listen and parse the end user's STDIN. Drift only cares about the keys
    /// that quit.
    pub fn start(
        protocol_tx: tokio::sync::broadcast::Sender<crate::run::Protocol>,
    ) -> std::thread::JoinHandle<std::result::Result<(), color_eyre::eyre::Error>> {
        // The Tokio docs actually suggest using `std::thread` to listen on STDIN for interactive
        // applications.
        std::thread::spawn(move || -> Result<()> {
            let protocol_for_shutdown = protocol_tx.clone();
            let input = Self { protocol_tx };
            let result = input.consume_stdin();
            if let Err(error) = result {
                crate::run::broadcast_protocol_end(&protocol_for_shutdown);
                return Err(error);
            }
            Ok(())
        })
    }

    /// Listen to the end user's STDIN and parse all the bytes into known events.
    fn consume_stdin(&self) -> Result<()> {
        tracing::debug!("Starting to listen on STDIN");

        let stdin = std::io::stdin();
        let mut reader = std::io::BufReader::new(stdin);
        let mut parser = termwiz::input::InputParser::new();

        loop {
            let mut buffer: BytesFromSTDIN = [0; 128];
            let count = reader.read(&mut buffer[..])?;
            if count == 0 {
                tracing::debug!("STDIN closed");
                return Ok(());
            }

            if let Some(bytes) = buffer.get(0..count) {
                tracing::trace!("Received STDIN input: {bytes:x?}");
                parser.parse(bytes, |event| self.handle_event(&event), false);
            } else {
                tracing::warn!("Couldn't get bytes from STDIN input buffer");
            }
        }
    }

    /// The callback for when the input parser detects known keyboard/mouse events.
    fn handle_event(&self, event: &InputEvent) {
        tracing::trace!("Parsed input event: {event:?}");
        if is_quit_event(event) {
            tracing::debug!("Quit key pressed");
            crate::run::broadcast_protocol_end(&self.protocol_tx);
        }
    }
}

/// Is this one of the keys that quits Drift: `q`, `Esc` or `Ctrl-C`?
fn is_quit_event(event: &InputEvent) -> bool {
    let InputEvent::Key(KeyEvent { key, modifiers }) = event else {
        return false;
    };

    #[expect(
        clippy::wildcard_enum_match_arm,
        reason = "All other keys are ignored"
    )]
    match key {
        KeyCode::Char('q') | KeyCode::Escape => modifiers.is_empty(),
        KeyCode::Char('c' | 'C') => modifiers.contains(Modifiers::CTRL),
        // ETX, what Ctrl-C sends in raw mode.
        KeyCode::Char('\u{3}') => true,
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(bytes: &[u8]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        termwiz::input::InputParser::new().parse(bytes, |event| events.push(event), false);
        events
    }

    #[test]
    fn quit_keys() {
        for bytes in [b"q".as_slice(), b"\x1b", b"\x03"] {
            let events = parse(bytes);
            assert!(events.iter().any(is_quit_event), "{bytes:?}: {events:?}");
        }
    }

    #[test]
    fn other_keys_are_ignored() {
        for bytes in [b"a".as_slice(), b"Q", b"c", b"\x1b[A"] {
            let events = parse(bytes);
            assert!(!events.iter().any(is_quit_event), "{bytes:?}: {events:?}");
        }
    }
}
