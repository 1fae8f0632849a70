//! The service lifecycle state machine.
//!
//! One instance per node serializes all directory churn through a single
//! in-flight bulk operation:
//!
//! ```text
//!            register call deferred                 response / timeout
//!   ┌──────┐ ─────────────────────▶ ┌─────────────┐ ─────────────────▶ ┌──────┐
//!   │ Idle │                        │ Registering │                    │ Idle │
//!   └──────┘ ─────────────────────▶ ┌─────────────┐ ─────────────────▶ └──────┘
//!            request call           │ Requesting  │  all bound / timeout
//!                                   └─────────────┘
//! ```
//!
//! Registration always goes first: request work starts only on an idle tick
//! with nothing left to register.  A register call that completes
//! immediately never leaves Idle.  A request call always moves to
//! Requesting because the binding handshake still has to follow.
//!
//! Entering a state loads its timeout (Idle 0, Registering 10,
//! Requesting 30 ticks by default).  When the countdown reaches zero the
//! in-flight services go back on the queue and the machine returns to
//! Idle, so the next idle tick retries them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::directory::ServiceTable;
use crate::domain::service::ServiceMask;
use crate::protocol::codec::encode_binding;
use crate::protocol::messages::BindingMessage;
use crate::session::transport::{MeshTransport, NodeAddress, TransportStatus};

/// Default Registering timeout in ticks.
pub const DEFAULT_REGISTER_TIMEOUT_TICKS: u8 = 10;

/// Default Requesting timeout in ticks.
pub const DEFAULT_REQUEST_TIMEOUT_TICKS: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Idle,
    Registering,
    Requesting,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Idle => f.write_str("idle"),
            LifecycleState::Registering => f.write_str("registering"),
            LifecycleState::Requesting => f.write_str("requesting"),
        }
    }
}

/// Per-state timeouts in ticks.
///
/// A zero timeout is treated as one tick: Registering and Requesting must
/// always be able to time out back to Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    pub registering: u8,
    pub requesting: u8,
}

impl LifecycleTimeouts {
    fn for_state(&self, state: LifecycleState) -> u8 {
        match state {
            LifecycleState::Idle => 0,
            LifecycleState::Registering => self.registering.max(1),
            LifecycleState::Requesting => self.requesting.max(1),
        }
    }
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self {
            registering: DEFAULT_REGISTER_TIMEOUT_TICKS,
            requesting: DEFAULT_REQUEST_TIMEOUT_TICKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLifecycle {
    state: LifecycleState,
    timer: u8,
    timeouts: LifecycleTimeouts,
}

impl ServiceLifecycle {
    pub fn new(timeouts: LifecycleTimeouts) -> Self {
        Self {
            state: LifecycleState::Idle,
            timer: 0,
            timeouts,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Ticks left before the current state times out.  0 in Idle.
    pub fn timer(&self) -> u8 {
        self.timer
    }

    /// Moves to `next`, reloading the countdown.  Staying in the current
    /// state leaves the countdown running.
    fn transition(&mut self, next: LifecycleState) {
        if self.state == next {
            return;
        }
        self.state = next;
        self.timer = self.timeouts.for_state(next);
        debug!(state = %next, timeout_ticks = self.timer, "lifecycle transition");
    }

    /// Returns to Idle without touching the directories.  Used when a
    /// requested service reaches its binding target.
    pub fn force_idle(&mut self) {
        self.transition(LifecycleState::Idle);
    }

    /// Advances the countdown by one tick.
    ///
    /// When it reaches zero in Registering or Requesting, the pending
    /// services of that role are re-queued and the machine returns to Idle.
    /// Returns `true` on a timeout.
    pub fn count_down(&mut self, table: &mut ServiceTable) -> bool {
        if self.timer == 0 {
            return false;
        }
        self.timer -= 1;
        if self.timer > 0 {
            return false;
        }

        let requeued = match self.state {
            LifecycleState::Idle => return false,
            LifecycleState::Registering => table.register.requeue_pending(),
            LifecycleState::Requesting => table.request.requeue_pending(),
        };
        warn!(state = %self.state, services = %requeued, "lifecycle timed out, re-queueing");
        self.transition(LifecycleState::Idle);
        true
    }

    /// Starts the next bulk operation if the machine is idle.
    ///
    /// Call once per tick while the network is up.
    pub fn poll<T: MeshTransport>(&mut self, table: &mut ServiceTable, transport: &mut T) {
        if self.state != LifecycleState::Idle {
            return;
        }
        if !table.register.to_add().is_empty() {
            self.start_register(table, transport);
        } else if !table.request.to_add().is_empty() {
            self.start_request(table, transport);
        }
    }

    fn start_register<T: MeshTransport>(&mut self, table: &mut ServiceTable, transport: &mut T) {
        let services = table.register.begin_bulk();
        match transport.register_services(services) {
            Ok(TransportStatus::Success) => {
                table.register.commit_pending();
                info!(%services, "services registered");
            }
            Ok(TransportStatus::Deferred) => {
                debug!(%services, "register deferred, awaiting response");
                self.transition(LifecycleState::Registering);
            }
            Err(e) => {
                // The timeout path re-queues and retries.
                warn!(%services, error = %e, "register call failed");
                self.transition(LifecycleState::Registering);
            }
        }
    }

    fn start_request<T: MeshTransport>(&mut self, table: &mut ServiceTable, transport: &mut T) {
        let services = table.request.begin_bulk();
        match transport.request_services(services) {
            Ok(status) => debug!(%services, ?status, "services requested"),
            Err(e) => warn!(%services, error = %e, "request call failed"),
        }
        self.transition(LifecycleState::Requesting);
    }

    /// Handles a register response.  Ignored unless Registering.
    pub fn on_register_response(&mut self, table: &mut ServiceTable, services: ServiceMask) {
        if self.state != LifecycleState::Registering {
            debug!(%services, state = %self.state, "unexpected register response ignored");
            return;
        }
        let committed = table.register.commit_pending();
        info!(services = %committed, "services registered");
        self.transition(LifecycleState::Idle);
    }

    /// Handles a peer's answer to a service request.  Ignored unless
    /// Requesting.
    ///
    /// Sends a Query to `from` for every still-pending requested service the
    /// peer advertises, then returns to Idle if nothing is pending.
    pub fn on_request_response<T: MeshTransport>(
        &mut self,
        table: &mut ServiceTable,
        transport: &mut T,
        from: NodeAddress,
        advertised: ServiceMask,
    ) {
        if self.state != LifecycleState::Requesting {
            debug!(%from, services = %advertised, state = %self.state, "unexpected request response ignored");
            return;
        }

        for service in advertised.intersection(table.request.pending()).iter() {
            let frame = encode_binding(&BindingMessage::query(service));
            match transport.send_to(from, &frame) {
                Ok(_) => debug!(%from, %service, "query sent"),
                Err(e) => warn!(%from, %service, error = %e, "query send failed"),
            }
        }

        if table.request.pending().is_empty() {
            self.transition(LifecycleState::Idle);
        }
    }
}

impl Default for ServiceLifecycle {
    fn default() -> Self {
        Self::new(LifecycleTimeouts::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
