//! TOML-based configuration for the demonstration node.
//!
//! # File layout (for beginners)
//!
//! Every section and every field is optional.  A missing file, an empty
//! file and a file that only sets one value all work; whatever is absent
//! takes the default shown here:
//!
//! ```toml
//! [node]
//! log_level = "info"
//!
//! [network]
//! tick_ms = 100
//! register_timeout_ticks = 10
//! request_timeout_ticks = 30
//!
//! [service]
//! keyboard_service = 1
//! register_limit = 1
//! request_limit = 1
//!
//! [delivery]
//! retry_ticks = 2
//! initial_sequence = 128
//!
//! [simulation]
//! drop_every = 0
//! transmitter_address = 6066005650440193
//! receiver_address = 6066005650440194
//! ```
//!
//! Timeouts and retry intervals are counted in ticks, not milliseconds, so
//! changing `tick_ms` scales all of them together.
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use meshkey_core::protocol::sequence::INITIAL_SEQUENCE;
use meshkey_core::session::arq::DEFAULT_RETRY_TICKS;
use meshkey_core::session::lifecycle::{
    LifecycleTimeouts, DEFAULT_REGISTER_TIMEOUT_TICKS, DEFAULT_REQUEST_TIMEOUT_TICKS,
};
use meshkey_core::{NodeAddress, ServiceId, ServiceIdOutOfRange, SessionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `[service] keyboard_service` is not a valid service id.
    #[error("invalid keyboard_service: {0}")]
    KeyboardService(#[from] ServiceIdOutOfRange),

    /// A value parsed but cannot be used.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSettings,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSettings {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Tick period and lifecycle timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Length of one tick in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_register_timeout_ticks")]
    pub register_timeout_ticks: u8,
    #[serde(default = "default_request_timeout_ticks")]
    pub request_timeout_ticks: u8,
}

/// The keyboard service both nodes register and request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default = "default_keyboard_service")]
    pub keyboard_service: u8,
    /// Incoming bindings accepted per node (0 = unlimited).
    #[serde(default = "default_fan_limit")]
    pub register_limit: u8,
    /// Bindings each node establishes before its request is satisfied.
    #[serde(default = "default_fan_limit")]
    pub request_limit: u8,
}

/// Stop-and-wait ARQ tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryConfig {
    #[serde(default = "default_retry_ticks")]
    pub retry_ticks: u8,
    #[serde(default = "default_initial_sequence")]
    pub initial_sequence: u8,
}

/// The in-process mesh the two nodes share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Lose every n-th service frame (0 = lossless).
    #[serde(default)]
    pub drop_every: u32,
    #[serde(default = "default_transmitter_address")]
    pub transmitter_address: u64,
    #[serde(default = "default_receiver_address")]
    pub receiver_address: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_ms() -> u64 {
    100
}
fn default_register_timeout_ticks() -> u8 {
    DEFAULT_REGISTER_TIMEOUT_TICKS
}
fn default_request_timeout_ticks() -> u8 {
    DEFAULT_REQUEST_TIMEOUT_TICKS
}
fn default_keyboard_service() -> u8 {
    1
}
fn default_fan_limit() -> u8 {
    1
}
fn default_retry_ticks() -> u8 {
    DEFAULT_RETRY_TICKS
}
fn default_initial_sequence() -> u8 {
    INITIAL_SEQUENCE
}
fn default_transmitter_address() -> u64 {
    0x0015_8D00_0000_0001
}
fn default_receiver_address() -> u64 {
    0x0015_8D00_0000_0002
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            register_timeout_ticks: default_register_timeout_ticks(),
            request_timeout_ticks: default_request_timeout_ticks(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            keyboard_service: default_keyboard_service(),
            register_limit: default_fan_limit(),
            request_limit: default_fan_limit(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retry_ticks: default_retry_ticks(),
            initial_sequence: default_initial_sequence(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            drop_every: 0,
            transmitter_address: default_transmitter_address(),
            receiver_address: default_receiver_address(),
        }
    }
}

impl NodeConfig {
    /// Builds the core's tunables.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::KeyboardService`] if `keyboard_service` is not in
    ///   `1..=32`.
    /// - [`ConfigError::Invalid`] for a zero lifecycle timeout, a zero
    ///   `retry_ticks` or a zero `request_limit` (a request that can never
    ///   bind keeps the node down forever).
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        let delivery_service = ServiceId::try_from(self.service.keyboard_service)?;
        require_nonzero("network.register_timeout_ticks", self.network.register_timeout_ticks)?;
        require_nonzero("network.request_timeout_ticks", self.network.request_timeout_ticks)?;
        require_nonzero("delivery.retry_ticks", self.delivery.retry_ticks)?;
        require_nonzero("service.request_limit", self.service.request_limit)?;
        Ok(SessionConfig {
            delivery_service,
            timeouts: LifecycleTimeouts {
                registering: self.network.register_timeout_ticks,
                requesting: self.network.request_timeout_ticks,
            },
            retry_ticks: self.delivery.retry_ticks,
            initial_sequence: self.delivery.initial_sequence,
            ..SessionConfig::default()
        })
    }

    /// Duration of one tick.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `tick_ms` is zero.
    pub fn tick_period(&self) -> Result<Duration, ConfigError> {
        if self.network.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "network.tick_ms",
                reason: "must be greater than zero",
            });
        }
        Ok(Duration::from_millis(self.network.tick_ms))
    }

    /// Mesh addresses of the transmitter and receiver node.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if both nodes share an address.
    pub fn node_addresses(&self) -> Result<(NodeAddress, NodeAddress), ConfigError> {
        let tx = self.simulation.transmitter_address;
        let rx = self.simulation.receiver_address;
        if tx == rx {
            return Err(ConfigError::Invalid {
                field: "simulation.receiver_address",
                reason: "must differ from transmitter_address",
            });
        }
        Ok((NodeAddress(tx), NodeAddress(rx)))
    }
}

fn require_nonzero(field: &'static str, value: u8) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

/// Loads `NodeConfig` from `path`, returning `NodeConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: NodeConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NodeConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &NodeConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
