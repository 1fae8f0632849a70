//! Message types for the binding handshake and the stop-and-wait ARQ.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceId;

// ── Wire constants ────────────────────────────────────────────────────────────

/// Total length of an encoded binding frame, including the trailing NUL.
pub const BINDING_FRAME_LEN: usize = 7;

/// Binding frame length without the trailing NUL.  Decoding accepts frames
/// that omit it.
pub const BINDING_FRAME_MIN_LEN: usize = 6;

/// First byte of every binding frame.
pub const BINDING_MARKER: u8 = b'<';

/// Second byte of every binding frame.
pub const BINDING_TAG: u8 = b'B';

/// Closes the service-id field of a binding frame.
pub const BINDING_TERMINATOR: u8 = b'>';

/// Total length of an encoded delivery frame.
pub const DELIVERY_FRAME_LEN: usize = 3;

// ── Binding handshake ─────────────────────────────────────────────────────────

/// The three steps of the binding handshake.
///
/// ```text
///   requester                         registrant
///      │ ───────── Query(id) ──────────▶ │   id ready and below fan limit?
///      │ ◀──────── Accept(id) ────────── │
///   bind()                               │
///      │ ───────── Bound(id) ──────────▶ │   count the binding
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BindingCommand {
    Query = b'q',
    Accept = b'y',
    Bound = b'b',
}

impl TryFrom<u8> for BindingCommand {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            b'q' => Ok(BindingCommand::Query),
            b'y' => Ok(BindingCommand::Accept),
            b'b' => Ok(BindingCommand::Bound),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BindingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingCommand::Query => f.write_str("query"),
            BindingCommand::Accept => f.write_str("accept"),
            BindingCommand::Bound => f.write_str("bound"),
        }
    }
}

/// One binding handshake message.  Constructed per send/receive and never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingMessage {
    pub command: BindingCommand,
    pub service: ServiceId,
}

impl BindingMessage {
    pub fn query(service: ServiceId) -> Self {
        Self {
            command: BindingCommand::Query,
            service,
        }
    }

    pub fn accept(service: ServiceId) -> Self {
        Self {
            command: BindingCommand::Accept,
            service,
        }
    }

    pub fn bound(service: ServiceId) -> Self {
        Self {
            command: BindingCommand::Bound,
            service,
        }
    }
}

// ── Reliable delivery ─────────────────────────────────────────────────────────

/// Whether a delivery frame carries a payload or acknowledges one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeliveryKind {
    Data = b'K',
    Ack = b'A',
}

impl TryFrom<u8> for DeliveryKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            b'K' => Ok(DeliveryKind::Data),
            b'A' => Ok(DeliveryKind::Ack),
            _ => Err(()),
        }
    }
}

/// One stop-and-wait frame: a single payload byte and its sequence number.
///
/// An acknowledgement echoes both the sequence and the payload of the Data
/// frame it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMessage {
    pub kind: DeliveryKind,
    pub sequence: u8,
    pub payload: u8,
}

impl DeliveryMessage {
    pub fn data(sequence: u8, payload: u8) -> Self {
        Self {
            kind: DeliveryKind::Data,
            sequence,
            payload,
        }
    }

    pub fn ack(sequence: u8, payload: u8) -> Self {
        Self {
            kind: DeliveryKind::Ack,
            sequence,
            payload,
        }
    }

    /// The acknowledgement a receiver sends back for this frame.
    pub fn to_ack(self) -> Self {
        Self::ack(self.sequence, self.payload)
    }
}
