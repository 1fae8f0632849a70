//! Infrastructure layer for the demonstration node.
//!
//! Contains the adapters that touch the outside world: the TOML config file
//! and the activity indicators (rendered as log lines, since the simulated
//! nodes have no LEDs).
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `meshkey_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`storage`** – `NodeConfig`, `load_config` / `save_config`.
//! - **`indicator`** – `LogIndicator`, a [`StatusIndicator`] that records
//!   the per-role on/off state and traces every change.
//!
//! [`StatusIndicator`]: meshkey_core::StatusIndicator

pub mod indicator;
pub mod storage;
