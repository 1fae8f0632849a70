//! The session layer: everything that needs the radio.
//!
//! - **`transport`** – the [`MeshTransport`] boundary to the mesh stack, the
//!   [`MeshEvent`]s it delivers, and the [`StatusIndicator`] collaborator.
//! - **`lifecycle`** – the Idle / Registering / Requesting state machine
//!   that moves directory entries through bulk register and request calls.
//! - **`binding`** – the Query / Accept / Bound handshake.
//! - **`arq`** – the stop-and-wait transmitter and receiver.
//! - **`driver`** – [`MeshSession`], which owns all of the above for one
//!   node and is driven by ticks and transport events.
//! - **`sim`** – an in-memory mesh for tests and the demonstration node.
//!
//! # Execution model
//!
//! Everything here runs on one execution context.  Ticks and transport
//! events are handed to [`MeshSession::handle_event`] one at a time; no
//! call blocks and no state is shared between threads, so nothing needs a
//! lock.
//!
//! [`MeshTransport`]: transport::MeshTransport
//! [`MeshEvent`]: transport::MeshEvent
//! [`StatusIndicator`]: transport::StatusIndicator
//! [`MeshSession`]: driver::MeshSession
//! [`MeshSession::handle_event`]: driver::MeshSession::handle_event

pub mod arq;
pub mod binding;
pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod sim;
pub mod transport;
