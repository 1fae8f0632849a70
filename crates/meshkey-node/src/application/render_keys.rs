//! Display collaborator: renders key codes accepted by the receiver session.
//!
//! The receiver's ARQ hands over raw PS/2 scan codes, including break
//! prefixes and shift make/break codes.  [`TextRenderer`] runs them
//! through a [`Ps2Decoder`] and writes whatever printable text comes out.
//!
//! Rendering rules:
//!
//! - printable ASCII and tab are written as-is
//! - Enter (decoded as `'\r'`) starts a new line
//! - Backspace erases the previous character on a terminal
//! - everything else is ignored

use std::io::Write;

use meshkey_core::keymap::Ps2Decoder;
use thiserror::Error;
use tracing::trace;

/// Error type for text rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing to the output failed.
    #[error("failed to write rendered text: {0}")]
    Io(#[from] std::io::Error),
}

const BACKSPACE: u8 = 0x08;

/// Scan-code stream → text on any [`Write`] sink.
pub struct TextRenderer<W> {
    out: W,
    decoder: Ps2Decoder,
    rendered: u64,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            decoder: Ps2Decoder::new(),
            rendered: 0,
        }
    }

    /// Decodes one scan code and renders the character it produces, if any.
    ///
    /// Returns the ASCII byte that was rendered.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] if the output cannot be written.
    pub fn on_scan_code(&mut self, code: u8) -> Result<Option<u8>, RenderError> {
        let ascii = self.decoder.decode(code);
        self.on_key_received(ascii)
    }

    /// Renders one decoded ASCII byte.  `0` means "nothing to show".
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] if the output cannot be written.
    pub fn on_key_received(&mut self, ascii: u8) -> Result<Option<u8>, RenderError> {
        match ascii {
            b'\r' | b'\n' => self.out.write_all(b"\n")?,
            BACKSPACE => self.out.write_all(b"\x08 \x08")?,
            b'\t' | b' '..=b'~' => self.out.write_all(&[ascii])?,
            _ => return Ok(None),
        }
        self.out.flush()?;
        self.rendered += 1;
        trace!(ascii, "key rendered");
        Ok(Some(ascii))
    }

    /// Characters rendered so far.
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn render(codes: &[u8]) -> String {
        let mut renderer = TextRenderer::new(Vec::new());
        for &code in codes {
            renderer.on_scan_code(code).expect("vec write");
        }
        String::from_utf8(renderer.into_output()).expect("ascii output")
    }

    #[test]
    fn test_make_break_sequence_renders_once() {
        // Arrange: 'h' 'i' as make, break-prefix, make
        let codes = [0x33, 0xF0, 0x33, 0x43, 0xF0, 0x43];

        // Act
        let text = render(&codes);

        // Assert
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_shifted_key_renders_upper_case() {
        let codes = [0x12, 0x1C, 0xF0, 0x1C, 0xF0, 0x12, 0x1C, 0xF0, 0x1C];

        assert_eq!(render(&codes), "Aa");
    }

    #[test]
    fn test_enter_renders_newline() {
        assert_eq!(render(&[0x5A, 0xF0, 0x5A]), "\n");
    }

    #[test]
    fn test_non_printing_key_renders_nothing() {
        // Arrange
        let mut renderer = TextRenderer::new(Vec::new());

        // Act: F1 make code
        let rendered = renderer.on_scan_code(0x05).expect("vec write");

        // Assert
        assert_eq!(rendered, None);
        assert_eq!(renderer.rendered(), 0);
        assert!(renderer.output().is_empty());
    }

    #[test]
    fn test_backspace_erases_on_terminal() {
        let mut renderer = TextRenderer::new(Vec::new());

        renderer.on_key_received(BACKSPACE).expect("vec write");

        assert_eq!(renderer.output().as_slice(), b"\x08 \x08");
    }

    #[test]
    fn test_zero_is_ignored() {
        let mut renderer = TextRenderer::new(Vec::new());

        assert_eq!(renderer.on_key_received(0).expect("vec write"), None);
    }
}
