//! Encoding and decoding for the two fixed-size frame formats.
//!
//! Binding frame (7 bytes, ASCII):
//! ```text
//! [ '<' ][ 'B' ][ cmd ][ tens ][ units ][ '>' ][ NUL ]
//!                 q|y|b   '0'..'3' '0'..'9'
//! ```
//!
//! Delivery frame (3 bytes):
//! ```text
//! [ 'K' | 'A' ][ sequence ][ payload ]
//! ```
//!
//! Decoding is strict about everything except the trailing NUL of a
//! binding frame, which some senders strip.  Callers drop any frame that
//! fails to decode; nothing here is ever fatal.

use std::fmt;

use thiserror::Error;

use crate::domain::service::ServiceId;
use crate::protocol::messages::{
    BindingCommand, BindingMessage, DeliveryKind, DeliveryMessage, BINDING_FRAME_LEN,
    BINDING_FRAME_MIN_LEN, BINDING_MARKER, BINDING_TAG, BINDING_TERMINATOR, DELIVERY_FRAME_LEN,
};

/// Reasons a received frame was not understood.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the frame format requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The frame does not start with `<B`.
    #[error("missing binding marker")]
    MissingMarker,

    /// The command byte is not `q`, `y` or `b`.
    #[error("unknown binding command: 0x{0:02X}")]
    UnknownCommand(u8),

    /// The frame is not closed with `>` after the service id.
    #[error("missing binding terminator")]
    MissingTerminator,

    /// The service-id field is not two ASCII decimal digits.
    #[error("service id field is not decimal: {0:02X?}")]
    NonDecimalServiceId([u8; 2]),

    /// The service id parsed but lies outside `1..=32`.
    #[error("service id {0} is outside 1..=32")]
    ServiceIdOutOfRange(u8),

    /// The tag byte of a delivery frame is not `K` or `A`.
    #[error("unknown delivery tag: 0x{0:02X}")]
    UnknownDeliveryTag(u8),
}

// ── Binding frames ────────────────────────────────────────────────────────────

/// Returns `true` if `bytes` starts with the binding marker `<B`.
///
/// This is the cheap peek the receive path uses to route plain data to the
/// binding protocol before attempting a full decode.
pub fn is_binding_frame(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == BINDING_MARKER && bytes[1] == BINDING_TAG
}

/// Encodes a binding message as its 7-byte wire frame.
///
/// # Examples
///
/// ```rust
/// use meshkey_core::protocol::{encode_binding, BindingMessage};
/// use meshkey_core::ServiceId;
///
/// let id = ServiceId::new(7).unwrap();
/// assert_eq!(&encode_binding(&BindingMessage::query(id)), b"<Bq07>\0");
/// ```
pub fn encode_binding(msg: &BindingMessage) -> [u8; BINDING_FRAME_LEN] {
    let id = msg.service.get();
    [
        BINDING_MARKER,
        BINDING_TAG,
        msg.command as u8,
        b'0' + id / 10,
        b'0' + id % 10,
        BINDING_TERMINATOR,
        0,
    ]
}

/// Decodes a binding frame.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is short, carries the wrong
/// marker, command or terminator, or names a service outside `1..=32`.
pub fn decode_binding(bytes: &[u8]) -> Result<BindingMessage, ProtocolError> {
    if bytes.len() < BINDING_FRAME_MIN_LEN {
        return Err(ProtocolError::InsufficientData {
            needed: BINDING_FRAME_MIN_LEN,
            available: bytes.len(),
        });
    }
    if !is_binding_frame(bytes) {
        return Err(ProtocolError::MissingMarker);
    }

    let command =
        BindingCommand::try_from(bytes[2]).map_err(|_| ProtocolError::UnknownCommand(bytes[2]))?;

    let digits = [bytes[3], bytes[4]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::NonDecimalServiceId(digits));
    }
    if bytes[5] != BINDING_TERMINATOR {
        return Err(ProtocolError::MissingTerminator);
    }

    let raw = (digits[0] - b'0') * 10 + (digits[1] - b'0');
    let service = ServiceId::new(raw).ok_or(ProtocolError::ServiceIdOutOfRange(raw))?;

    Ok(BindingMessage { command, service })
}

// ── Delivery frames ───────────────────────────────────────────────────────────

/// Encodes a delivery message as its 3-byte wire frame.
pub fn encode_delivery(msg: &DeliveryMessage) -> [u8; DELIVERY_FRAME_LEN] {
    [msg.kind as u8, msg.sequence, msg.payload]
}

/// Decodes a delivery frame.  Bytes past the third are ignored.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the frame is shorter than 3 bytes or the
/// tag is neither `K` nor `A`.
pub fn decode_delivery(bytes: &[u8]) -> Result<DeliveryMessage, ProtocolError> {
    if bytes.len() < DELIVERY_FRAME_LEN {
        return Err(ProtocolError::InsufficientData {
            needed: DELIVERY_FRAME_LEN,
            available: bytes.len(),
        });
    }
    let kind =
        DeliveryKind::try_from(bytes[0]).map_err(|_| ProtocolError::UnknownDeliveryTag(bytes[0]))?;
    Ok(DeliveryMessage {
        kind,
        sequence: bytes[1],
        payload: bytes[2],
    })
}

// ── Trace helpers ─────────────────────────────────────────────────────────────

/// Formats a payload for trace output.
///
/// Printable ASCII (up to an optional NUL terminator) is shown as text;
/// anything else is shown as its length.
pub struct PayloadText<'a>(pub &'a [u8]);

impl fmt::Display for PayloadText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self.0.iter().position(|&b| b == 0) {
            Some(end) => &self.0[..end],
            None => self.0,
        };
        if !text.is_empty() && text.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "\"{}\"", String::from_utf8_lossy(text))
        } else {
            write!(f, "<{} bytes>", self.0.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u8) -> ServiceId {
        ServiceId::new(raw).expect("valid id")
    }

    #[test]
    fn test_encode_binding_is_bit_exact() {
        // Arrange
        let msg = BindingMessage::accept(id(32));

        // Act
        let frame = encode_binding(&msg);

        // Assert
        assert_eq!(&frame, b"<By32>\0");
    }

    #[test]
    fn test_encode_binding_zero_pads_single_digit_ids() {
        assert_eq!(&encode_binding(&BindingMessage::bound(id(1))), b"<Bb01>\0");
    }

    #[test]
    fn test_decode_binding_accepts_every_command() {
        assert_eq!(decode_binding(b"<Bq01>\0"), Ok(BindingMessage::query(id(1))));
        assert_eq!(decode_binding(b"<By12>\0"), Ok(BindingMessage::accept(id(12))));
        assert_eq!(decode_binding(b"<Bb32>\0"), Ok(BindingMessage::bound(id(32))));
    }

    #[test]
    fn test_decode_binding_tolerates_missing_nul() {
        assert_eq!(decode_binding(b"<Bq05>"), Ok(BindingMessage::query(id(5))));
    }

    #[test]
    fn test_decode_binding_rejects_out_of_range_id() {
        assert_eq!(
            decode_binding(b"<Bq33>\0"),
            Err(ProtocolError::ServiceIdOutOfRange(33))
        );
        assert_eq!(
            decode_binding(b"<Bq00>\0"),
            Err(ProtocolError::ServiceIdOutOfRange(0))
        );
    }

    #[test]
    fn test_decode_binding_rejects_malformed_frames() {
        assert!(matches!(
            decode_binding(b"<Bq0"),
            Err(ProtocolError::InsufficientData { needed: 6, available: 4 })
        ));
        assert_eq!(decode_binding(b"<Cq01>\0"), Err(ProtocolError::MissingMarker));
        assert_eq!(
            decode_binding(b"<Bx01>\0"),
            Err(ProtocolError::UnknownCommand(b'x'))
        );
        assert_eq!(
            decode_binding(b"<Bq0a>\0"),
            Err(ProtocolError::NonDecimalServiceId([b'0', b'a']))
        );
        assert_eq!(
            decode_binding(b"<Bq01]\0"),
            Err(ProtocolError::MissingTerminator)
        );
    }

    #[test]
    fn test_is_binding_frame_peeks_marker_only() {
        assert!(is_binding_frame(b"<B"));
        assert!(!is_binding_frame(b"<"));
        assert!(!is_binding_frame(b"KB"));
    }

    #[test]
    fn test_delivery_frame_layout() {
        // Arrange
        let msg = DeliveryMessage::data(0x80, 0x1C);

        // Act
        let frame = encode_delivery(&msg);

        // Assert
        assert_eq!(frame, [b'K', 0x80, 0x1C]);
        assert_eq!(decode_delivery(&frame), Ok(msg));
    }

    #[test]
    fn test_decode_delivery_rejects_short_and_unknown_tag() {
        assert!(matches!(
            decode_delivery(&[b'A', 1]),
            Err(ProtocolError::InsufficientData { .. })
        ));
        assert_eq!(
            decode_delivery(&[b'Z', 1, 2]),
            Err(ProtocolError::UnknownDeliveryTag(b'Z'))
        );
    }

    #[test]
    fn test_payload_text_shows_printable_ascii() {
        assert_eq!(PayloadText(b"<Bq01>\0").to_string(), "\"<Bq01>\"");
        assert_eq!(PayloadText(&[b'K', 0x80, 0x1C]).to_string(), "<3 bytes>");
        assert_eq!(PayloadText(&[]).to_string(), "<0 bytes>");
    }
}
