//! # meshkey-node
//!
//! A runnable two-node wireless keyboard built on `meshkey-core`.
//!
//! One process hosts both nodes on an in-memory [`SimulatedMesh`]: the
//! *transmitter* node owns the keyboard, the *receiver* node owns the
//! display.  Both register and request the keyboard service, bind to each
//! other through the Query / Accept / Bound handshake and then move key
//! codes across with the stop-and-wait ARQ.
//!
//! # Layers
//!
//! - **`application`** – the keyboard and display collaborators.  They only
//!   know about `meshkey-core` types.
//! - **`infrastructure`** – TOML configuration and the log-backed activity
//!   indicator.
//! - **`runner`** – [`NodePair`], which wires the two sessions, the
//!   simulated mesh and both collaborators together and advances them one
//!   tick at a time.  `main.rs` drives it from a tokio interval.
//!
//! [`SimulatedMesh`]: meshkey_core::session::sim::SimulatedMesh
//! [`NodePair`]: runner::NodePair

/// Application layer: keyboard feeder and text renderer.
pub mod application;

/// Infrastructure layer: configuration storage and status indicators.
pub mod infrastructure;

/// Composition of two nodes over the simulated mesh.
pub mod runner;
