//! Keyboard collaborator: turns typed text into a paced stream of scan codes.
//!
//! The ARQ transmitter holds exactly one code in flight, so the keyboard
//! side needs a queue in front of it.  [`KeyboardFeeder`] keeps that queue
//! and offers the head code to a [`KeySink`] once per call to
//! [`KeyboardFeeder::pump`].  A code leaves the queue only when the sink
//! accepted it; while the session is still binding or waiting for an Ack
//! the code simply stays at the head.

use std::collections::VecDeque;

use meshkey_core::keymap::encode_ascii;
use meshkey_core::{MeshSession, MeshTransport, SessionError, StatusIndicator};
use tracing::{debug, warn};

/// Anything that can accept one key code at a time.
///
/// Implemented for [`MeshSession`]; tests substitute a recording fake.
pub trait KeySink {
    /// `true` if [`KeySink::transmit_key`] would accept a new code now.
    fn ready_for_key(&self) -> bool;

    /// Hands one code to the transport.
    fn transmit_key(&mut self, code: u8) -> Result<(), SessionError>;
}

impl<T: MeshTransport, I: StatusIndicator> KeySink for MeshSession<T, I> {
    fn ready_for_key(&self) -> bool {
        self.services_up() && !self.transmitter().awaiting_ack()
    }

    fn transmit_key(&mut self, code: u8) -> Result<(), SessionError> {
        MeshSession::transmit_key(self, code)
    }
}

/// Result of one [`KeyboardFeeder::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The head code was accepted by the sink.
    Sent(u8),
    /// Codes are queued but the sink is not ready for one.
    Waiting,
    /// Nothing to send.
    Empty,
}

/// Queue of scan codes waiting to be transmitted.
#[derive(Debug, Default)]
pub struct KeyboardFeeder {
    queue: VecDeque<u8>,
    sent: u64,
}

impl KeyboardFeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the make/break sequence for every character of `text`.
    ///
    /// Characters with no key on a US layout are skipped with a warning.
    /// Returns the number of characters queued.
    pub fn push_text(&mut self, text: &str) -> usize {
        let mut queued = 0;
        for ch in text.chars() {
            match encode_ascii(ch) {
                Some(codes) => {
                    codes.into_iter().for_each(|code| self.push_code(code));
                    queued += 1;
                }
                None => warn!(?ch, "no scan code for character; skipped"),
            }
        }
        queued
    }

    fn push_code(&mut self, code: u8) {
        self.queue.push_back(code);
    }

    /// Scan codes still waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Scan codes accepted by the sink so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Offers the head code to `sink`.
    ///
    /// # Errors
    ///
    /// Only errors the feeder cannot wait out are returned.  "Not up yet",
    /// "not bound yet" and "still awaiting an Ack" report
    /// [`FeedOutcome::Waiting`] and keep the code queued.
    pub fn pump<S: KeySink>(&mut self, sink: &mut S) -> Result<FeedOutcome, SessionError> {
        let Some(&code) = self.queue.front() else {
            return Ok(FeedOutcome::Empty);
        };
        if !sink.ready_for_key() {
            return Ok(FeedOutcome::Waiting);
        }
        match sink.transmit_key(code) {
            Ok(()) => {
                self.queue.pop_front();
                self.sent += 1;
                debug!(code = format_args!("0x{code:02X}"), remaining = self.queue.len(), "key sent");
                Ok(FeedOutcome::Sent(code))
            }
            Err(
                e @ (SessionError::ServicesNotUp
                | SessionError::ServiceNotBound(_)
                | SessionError::AwaitingAck { .. }),
            ) => {
                debug!(error = %e, "key held");
                Ok(FeedOutcome::Waiting)
            }
            Err(e) => Err(e),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
