//! The boundary between the session core and the mesh radio stack.
//!
//! The core never talks to a radio directly.  It calls a [`MeshTransport`]
//! to send frames and make bulk service calls, and the owner feeds it the
//! stack's notifications as [`MeshEvent`]s.  Status lights (or log lines
//! standing in for them) go through a [`StatusIndicator`].
//!
//! Implementations in this workspace:
//!
//! | Type                          | Used by                          |
//! |-------------------------------|----------------------------------|
//! | [`SimulatedLink`]             | integration tests, demo node     |
//! | `MockMeshTransport` (mockall) | unit tests of the session driver |
//!
//! [`SimulatedLink`]: super::sim::SimulatedLink

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::service::{ServiceId, ServiceMask, ServiceRole};

// ── Addressing ────────────────────────────────────────────────────────────────

/// A 64-bit mesh node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddress(pub u64);

impl fmt::Display for NodeAddress {
    /// Formats as two 32-bit halves, `high:low`, in hex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

// ── Call results ──────────────────────────────────────────────────────────────

/// Outcome of a transport call that the stack accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The operation completed immediately.
    Success,
    /// The operation was accepted; its result arrives later as a
    /// [`MeshEvent`].
    Deferred,
}

/// A transport call the stack refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid parameter")]
    InvalidParameter,

    #[error("stack resources exhausted")]
    StackResources,

    #[error("stack busy")]
    StackBusy,

    #[error("unknown stack error: {0}")]
    Unknown(String),
}

/// Operations the session core needs from the mesh stack.
///
/// Every call must return promptly.  Anything that takes longer is reported
/// as [`TransportStatus::Deferred`] and completed by a later [`MeshEvent`].
#[cfg_attr(test, mockall::automock)]
pub trait MeshTransport {
    /// Sends `bytes` to the node at `address`.
    fn send_to(&mut self, address: NodeAddress, bytes: &[u8])
        -> Result<TransportStatus, TransportError>;

    /// Sends `bytes` to every peer bound to `service`.
    fn send_to_bound_service(
        &mut self,
        service: ServiceId,
        bytes: &[u8],
    ) -> Result<TransportStatus, TransportError>;

    /// Registers every service in `services` so peers can bind to them.
    fn register_services(&mut self, services: ServiceMask)
        -> Result<TransportStatus, TransportError>;

    /// Asks the network which peers registered any of `services`.  Answers
    /// arrive as [`MeshEvent::RequestResponse`].
    fn request_services(&mut self, services: ServiceMask)
        -> Result<TransportStatus, TransportError>;

    /// Binds `service` to the peer at `address`.
    fn bind_service(
        &mut self,
        service: ServiceId,
        address: NodeAddress,
    ) -> Result<TransportStatus, TransportError>;
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Notifications from the mesh stack and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// The node has joined the network.
    NetworkUp,
    /// A deferred [`MeshTransport::register_services`] call completed.
    RegisterResponse { services: ServiceMask },
    /// A peer answered [`MeshTransport::request_services`] with the
    /// services it has registered.
    RequestResponse {
        from: NodeAddress,
        services: ServiceMask,
    },
    /// Data arrived over a bound service.  `service` is the raw id from the
    /// stack and is validated by the session.
    DataToService {
        from: NodeAddress,
        service: u8,
        payload: Vec<u8>,
    },
    /// Data addressed to this node.
    Data { from: NodeAddress, payload: Vec<u8> },
    /// The periodic scheduler tick (nominally 100 ms).
    Tick,
}

// ── Indicators ────────────────────────────────────────────────────────────────

/// Per-role activity light.
///
/// A role's indicator is on while its services are being set up, turns off
/// once the role is up, and flashes briefly for each frame sent (Request)
/// or received (Register) on a bound service.
pub trait StatusIndicator {
    fn set(&mut self, role: ServiceRole, on: bool);
}

/// An indicator that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    fn set(&mut self, _role: ServiceRole, _on: bool) {}
}
