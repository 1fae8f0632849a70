//! Stop-and-wait ARQ for one payload byte per round trip.
//!
//! # How it works (for beginners)
//!
//! The transmitter sends one Data frame and then waits.  If no matching
//! Ack arrives within `retry_ticks` ticks it sends the *same* frame again,
//! forever, until one does.  Only then does it move to the next sequence
//! number and accept a new payload.
//!
//! The receiver acknowledges every Data frame it sees, echoing its sequence
//! and payload, even ones it has already accepted.  That way a lost Ack is
//! simply answered again when the retransmission arrives.  The payload is
//! handed on only when the sequence is the one the receiver expects next,
//! so a retransmitted key is delivered exactly once.
//!
//! ```text
//!   transmitter                      receiver (expects 0x80)
//!   K 80 1C  ───────────────────▶   deliver 0x1C, expect 0x81
//!            ◀───── A 80 1C ──X      (lost)
//!   ...2 ticks...
//!   K 80 1C  ───────────────────▶   duplicate, not delivered
//!            ◀───── A 80 1C ─────
//!   seq = 0x81
//! ```

use tracing::{debug, trace};

use crate::protocol::messages::{DeliveryKind, DeliveryMessage};
use crate::protocol::sequence::{Sequence, INITIAL_SEQUENCE};
use crate::session::error::SessionError;

/// Default ticks to wait for an Ack before retransmitting.
pub const DEFAULT_RETRY_TICKS: u8 = 2;

// ── Transmitter ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArqTransmitter {
    sequence: Sequence,
    pending_payload: u8,
    awaiting_ack: bool,
    retry_timer: u8,
    retry_ticks: u8,
}

impl ArqTransmitter {
    pub fn new(initial_sequence: u8, retry_ticks: u8) -> Self {
        Self {
            sequence: Sequence::new(initial_sequence),
            pending_payload: 0,
            awaiting_ack: false,
            retry_timer: 0,
            retry_ticks,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence.get()
    }

    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    pub fn retry_timer(&self) -> u8 {
        self.retry_timer
    }

    /// The payload in flight, if any.
    pub fn pending_payload(&self) -> Option<u8> {
        self.awaiting_ack.then_some(self.pending_payload)
    }

    /// Starts sending `payload` and returns the Data frame to transmit.
    ///
    /// # Errors
    ///
    /// [`SessionError::AwaitingAck`] if the previous payload has not been
    /// acknowledged yet.
    pub fn send(&mut self, payload: u8) -> Result<DeliveryMessage, SessionError> {
        if self.awaiting_ack {
            return Err(SessionError::AwaitingAck {
                sequence: self.sequence.get(),
            });
        }
        self.pending_payload = payload;
        self.awaiting_ack = true;
        self.retry_timer = self.retry_ticks;
        let msg = self.current_frame();
        debug!(sequence = %self.sequence, payload, "data sent");
        Ok(msg)
    }

    /// Counts the retry timer down by one tick.
    pub fn count_down(&mut self) {
        self.retry_timer = self.retry_timer.saturating_sub(1);
    }

    /// Returns the frame to retransmit if the retry timer has run out while
    /// awaiting an ack, and restarts the timer.
    pub fn due_retransmission(&mut self) -> Option<DeliveryMessage> {
        if !self.awaiting_ack || self.retry_timer > 0 {
            return None;
        }
        self.retry_timer = self.retry_ticks;
        debug!(sequence = %self.sequence, payload = self.pending_payload, "retransmitting");
        Some(self.current_frame())
    }

    /// One scheduler tick: count down, then retransmit if due.
    pub fn on_tick(&mut self) -> Option<DeliveryMessage> {
        self.count_down();
        self.due_retransmission()
    }

    /// Handles an inbound Ack.  Returns `true` if it acknowledged the
    /// payload in flight.
    pub fn on_ack(&mut self, ack: &DeliveryMessage) -> bool {
        if ack.kind != DeliveryKind::Ack || ack.sequence != self.sequence.get() {
            trace!(sequence = ack.sequence, expected = %self.sequence, "stale ack ignored");
            return false;
        }
        self.awaiting_ack = false;
        self.retry_timer = 0;
        self.sequence.advance();
        debug!(acked = ack.sequence, next = %self.sequence, "ack accepted");
        true
    }

    fn current_frame(&self) -> DeliveryMessage {
        DeliveryMessage::data(self.sequence.get(), self.pending_payload)
    }
}

impl Default for ArqTransmitter {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE, DEFAULT_RETRY_TICKS)
    }
}

// ── Receiver ──────────────────────────────────────────────────────────────────

/// What the receiver did with one Data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// The Ack to send back.  Always present.
    pub ack: DeliveryMessage,
    /// The payload, if this frame carried the expected sequence.
    pub delivered: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArqReceiver {
    expected: Sequence,
}

impl ArqReceiver {
    pub fn new(initial_sequence: u8) -> Self {
        Self {
            expected: Sequence::new(initial_sequence),
        }
    }

    /// The sequence the next new payload must carry.
    pub fn expected(&self) -> u8 {
        self.expected.get()
    }

    /// Handles an inbound Data frame.
    pub fn on_data(&mut self, data: &DeliveryMessage) -> Receipt {
        let ack = data.to_ack();
        if data.sequence != self.expected.get() {
            debug!(sequence = data.sequence, expected = %self.expected, "duplicate data re-acked");
            return Receipt {
                ack,
                delivered: None,
            };
        }
        self.expected.advance();
        debug!(sequence = data.sequence, payload = data.payload, "data accepted");
        Receipt {
            ack,
            delivered: Some(data.payload),
        }
    }
}

impl Default for ArqReceiver {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
