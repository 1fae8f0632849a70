//! # meshkey-core
//!
//! Session and transport core for a two-node wireless keyboard: a
//! transmitter node reads a keyboard and forwards scan codes over a radio
//! mesh, a receiver node renders them.
//!
//! This crate has no dependency on a particular radio stack, keyboard
//! driver or display.  Everything outside the session layer is reached
//! through the traits in [`session::transport`].
//!
//! # Architecture overview (for beginners)
//!
//! The mesh radio gives us an *unreliable, addressed* delivery primitive:
//! "send these bytes to node X" and "send these bytes to whoever is bound
//! to service N".  On top of that this crate builds two things:
//!
//! - **A service directory protocol** – each node *registers* the services
//!   it can receive and *requests* the services it wants to transmit on.
//!   A small Query / Accept / Bound handshake lets the two sides agree on
//!   a binding without any central coordinator.
//!
//! - **Reliable delivery** – a stop-and-wait ARQ moves one key code per
//!   round trip over the bound service, retransmitting until acknowledged.
//!
//! The modules are layered leaves-first:
//!
//! - **`domain`** – service ids, 32-bit service masks and the per-role
//!   service directories.
//! - **`protocol`** – the two bit-exact wire formats (7-byte binding frame,
//!   3-byte delivery frame) and the wrapping 8-bit sequence counter.
//! - **`session`** – the lifecycle state machine, the binding handshake,
//!   the ARQ transmitter/receiver and [`MeshSession`], the single-threaded
//!   driver that owns all of them.
//! - **`keymap`** – PS/2 scan-code translation used by the keyboard and
//!   rendering collaborators.

pub mod domain;
pub mod keymap;
pub mod protocol;
pub mod session;

// Re-export the most-used types at the crate root so callers can write
// `meshkey_core::MeshSession` instead of `meshkey_core::session::driver::MeshSession`.
pub use domain::directory::{ServiceDirectory, ServiceTable, UNLIMITED_BINDINGS};
pub use domain::service::{service_mask, ServiceId, ServiceIdOutOfRange, ServiceMask, ServiceRole};
pub use protocol::codec::ProtocolError;
pub use protocol::messages::{BindingCommand, BindingMessage, DeliveryKind, DeliveryMessage};
pub use session::driver::{MeshSession, SessionConfig};
pub use session::error::SessionError;
pub use session::lifecycle::LifecycleState;
pub use session::transport::{
    MeshEvent, MeshTransport, NodeAddress, StatusIndicator, TransportError, TransportStatus,
};
