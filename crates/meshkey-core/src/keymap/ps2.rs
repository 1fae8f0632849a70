//! PS/2 scan-code set 2 ↔ ASCII translation.
//!
//! # How a PS/2 keyboard reports keys (for beginners)
//!
//! A PS/2 keyboard sends one *make* code when a key goes down and a *break*
//! sequence when it comes up.  In scan-code set 2 the break sequence is the
//! prefix byte `0xF0` followed by the make code.  Some keys (arrows, right
//! Ctrl, keypad Enter) are *extended*: their codes are preceded by `0xE0`.
//!
//! ```text
//!   press 'a'    → 1C
//!   release 'a'  → F0 1C
//!   press Left   → E0 6B
//!   release Left → E0 F0 6B
//! ```
//!
//! The decoder only needs to produce printable text, so it tracks just
//! enough state to do that: whether a break or extended prefix was just
//! seen, whether a shift key is held, and whether caps lock is on.  Every
//! other key decodes to 0.

use tracing::trace;

/// Break prefix.
pub const BREAK_PREFIX: u8 = 0xF0;

/// Extended-key prefix.
pub const EXTENDED_PREFIX: u8 = 0xE0;

/// Prefix of the Pause key's eight-byte sequence.
pub const PAUSE_PREFIX: u8 = 0xE1;

pub const LEFT_SHIFT: u8 = 0x12;
pub const RIGHT_SHIFT: u8 = 0x59;
pub const CAPS_LOCK: u8 = 0x58;

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Stateful scan-code stream → ASCII decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ps2Decoder {
    break_pending: bool,
    extended_pending: bool,
    shifted: bool,
    caps_lock: bool,
}

impl Ps2Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while caps lock is toggled on.
    pub fn caps_lock(&self) -> bool {
        self.caps_lock
    }

    /// Feeds one byte of the scan-code stream.
    ///
    /// Returns the ASCII character produced by this byte, or 0 when the byte
    /// is a prefix, a release, a modifier or a non-printing key.
    pub fn decode(&mut self, code: u8) -> u8 {
        match code {
            BREAK_PREFIX => {
                // E0 F0 xx is an extended release; the F0 takes over.
                self.break_pending = true;
                self.extended_pending = false;
                0
            }
            EXTENDED_PREFIX => {
                self.extended_pending = true;
                0
            }
            PAUSE_PREFIX => 0,
            _ if self.break_pending => {
                self.break_pending = false;
                if is_shift(code) {
                    self.shifted = false;
                }
                0
            }
            _ if self.extended_pending => {
                self.extended_pending = false;
                0
            }
            _ if is_shift(code) => {
                self.shifted = true;
                0
            }
            CAPS_LOCK => {
                self.caps_lock = !self.caps_lock;
                trace!(caps_lock = self.caps_lock, "caps lock toggled");
                0
            }
            _ if self.shifted => shifted(code),
            _ => {
                let ch = unshifted(code);
                if self.caps_lock && ch.is_ascii_lowercase() {
                    shifted(code)
                } else {
                    ch
                }
            }
        }
    }
}

fn is_shift(code: u8) -> bool {
    code == LEFT_SHIFT || code == RIGHT_SHIFT
}

// ── Encoder ───────────────────────────────────────────────────────────────────

/// Encodes one ASCII character as the make/break sequence a keyboard would
/// send when typing it.
///
/// Characters that need shift are wrapped in a left-shift press and
/// release.  Returns `None` for characters with no key on a US layout.
///
/// ```rust
/// use meshkey_core::keymap::encode_ascii;
///
/// assert_eq!(encode_ascii('a'), Some(vec![0x1C, 0xF0, 0x1C]));
/// assert_eq!(
///     encode_ascii('A'),
///     Some(vec![0x12, 0x1C, 0xF0, 0x1C, 0xF0, 0x12])
/// );
/// ```
pub fn encode_ascii(ch: char) -> Option<Vec<u8>> {
    let byte = u8::try_from(ch).ok()?;
    if let Some(code) = find_code(byte, unshifted) {
        return Some(vec![code, BREAK_PREFIX, code]);
    }
    let code = find_code(byte, shifted)?;
    Some(vec![
        LEFT_SHIFT,
        code,
        BREAK_PREFIX,
        code,
        BREAK_PREFIX,
        LEFT_SHIFT,
    ])
}

fn find_code(byte: u8, table: fn(u8) -> u8) -> Option<u8> {
    if byte == 0 {
        return None;
    }
    // '\n' is typed with the Enter key, which decodes as '\r'.
    let wanted = if byte == b'\n' { b'\r' } else { byte };
    (0..=0x7Fu8).find(|&code| table(code) == wanted)
}

// ── Tables ────────────────────────────────────────────────────────────────────

/// Set-2 make code → ASCII with no modifier held.
fn unshifted(code: u8) -> u8 {
    match code {
        0x0D => b'\t',
        0x0E => b'`',
        0x15 => b'q',
        0x16 => b'1',
        0x1A => b'z',
        0x1B => b's',
        0x1C => b'a',
        0x1D => b'w',
        0x1E => b'2',
        0x21 => b'c',
        0x22 => b'x',
        0x23 => b'd',
        0x24 => b'e',
        0x25 => b'4',
        0x26 => b'3',
        0x29 => b' ',
        0x2A => b'v',
        0x2B => b'f',
        0x2C => b't',
        0x2D => b'r',
        0x2E => b'5',
        0x31 => b'n',
        0x32 => b'b',
        0x33 => b'h',
        0x34 => b'g',
        0x35 => b'y',
        0x36 => b'6',
        0x3A => b'm',
        0x3B => b'j',
        0x3C => b'u',
        0x3D => b'7',
        0x3E => b'8',
        0x41 => b',',
        0x42 => b'k',
        0x43 => b'i',
        0x44 => b'o',
        0x45 => b'0',
        0x46 => b'9',
        0x49 => b'.',
        0x4A => b'/',
        0x4B => b'l',
        0x4C => b';',
        0x4D => b'p',
        0x4E => b'-',
        0x52 => b'\'',
        0x54 => b'[',
        0x55 => b'=',
        0x5A => b'\r',
        0x5B => b']',
        0x5D => b'\\',
        0x66 => 0x08,
        _ => 0,
    }
}

/// Set-2 make code → ASCII with shift held.
fn shifted(code: u8) -> u8 {
    match code {
        0x0E => b'~',
        0x16 => b'!',
        0x1E => b'@',
        0x26 => b'#',
        0x25 => b'$',
        0x2E => b'%',
        0x36 => b'^',
        0x3D => b'&',
        0x3E => b'*',
        0x46 => b'(',
        0x45 => b')',
        0x4E => b'_',
        0x55 => b'+',
        0x5D => b'|',
        0x54 => b'{',
        0x5B => b'}',
        0x4C => b':',
        0x52 => b'"',
        0x41 => b'<',
        0x49 => b'>',
        0x4A => b'?',
        _ => unshifted(code).to_ascii_uppercase(),
    }
}
