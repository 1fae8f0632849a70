//! The 8-bit wrapping sequence number used by the stop-and-wait ARQ.
//!
//! # Why only 8 bits? (for beginners)
//!
//! Stop-and-wait never has more than one frame in flight, so the receiver
//! only ever needs to tell "the frame I expect" apart from "the one before
//! it".  Any counter width works; one byte keeps the delivery frame at three
//! bytes.  The counter wraps from `0xFF` to `0x00` without panicking.

use std::fmt;

/// Sequence value both ends start from unless configured otherwise.
pub const INITIAL_SEQUENCE: u8 = 0x80;

/// A wrapping 8-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence(u8);

impl Sequence {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Moves to the next value, wrapping at 256.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self(INITIAL_SEQUENCE)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_starts_at_0x80() {
        assert_eq!(Sequence::default().get(), 0x80);
    }

    #[test]
    fn test_advance_increments() {
        // Arrange
        let mut seq = Sequence::new(0x80);

        // Act
        seq.advance();

        // Assert
        assert_eq!(seq.get(), 0x81);
    }

    #[test]
    fn test_advance_wraps_at_u8_max() {
        let mut seq = Sequence::new(0xFF);
        seq.advance();
        assert_eq!(seq.get(), 0x00, "sequence must wrap to 0 after 0xFF");
    }
}
