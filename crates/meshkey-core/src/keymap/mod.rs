//! Scan-code translation used by the keyboard and rendering collaborators.
//!
//! The session core itself never interprets payload bytes: the transmitter
//! forwards whatever the keyboard produced and the receiver hands accepted
//! bytes to the renderer untouched.  The keyboard speaks PS/2 scan-code
//! set 2, so the receiving side runs the stream through a [`Ps2Decoder`]
//! before rendering.

pub mod ps2;

pub use ps2::{encode_ascii, Ps2Decoder};
