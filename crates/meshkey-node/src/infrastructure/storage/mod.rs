//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads and writes the node's TOML configuration
//! and turns it into the [`SessionConfig`] the core consumes.  A missing
//! file is not an error; every field has a default.
//!
//! [`SessionConfig`]: meshkey_core::SessionConfig

pub mod config;
