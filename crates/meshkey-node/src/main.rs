//! MeshKey demonstration node: entry point.
//!
//! Runs a transmitter node and a receiver node on one in-process simulated
//! mesh.  Lines typed on stdin are turned into PS/2 scan codes, sent over
//! the bound keyboard service with stop-and-wait acknowledgement, decoded
//! on the receiver and echoed to stdout.
//!
//! # Usage
//!
//! ```text
//! meshkey-node [OPTIONS]
//!
//! Options:
//!   --config <PATH>        TOML config file [default: meshkey.toml]
//!   --log-level <LEVEL>    Log level when RUST_LOG is unset
//!   --drop-every <N>       Lose every N-th service frame (0 = never)
//!   --write-config         Write the effective config to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Default        | Description                     |
//! |----------------------|----------------|---------------------------------|
//! | `MESHKEY_CONFIG`     | `meshkey.toml` | Config file path                |
//! | `MESHKEY_LOG`        | from config    | Log level                       |
//! | `MESHKEY_DROP_EVERY` | from config    | Simulated frame loss            |
//!
//! CLI values override the config file.  `RUST_LOG` overrides every log
//! level setting.

use std::io::Stdout;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use meshkey_node::infrastructure::storage::config::{load_config, save_config, NodeConfig};
use meshkey_node::runner::NodePair;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// MeshKey two-node wireless keyboard demonstration.
#[derive(Debug, Parser)]
#[command(
    name = "meshkey-node",
    about = "Two-node wireless keyboard over a simulated mesh",
    version
)]
struct Cli {
    /// Path of the TOML config file.  A missing file means "all defaults".
    #[arg(long, default_value = "meshkey.toml", env = "MESHKEY_CONFIG")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set (overrides `[node] log_level`).
    #[arg(long, env = "MESHKEY_LOG")]
    log_level: Option<String>,

    /// Lose every N-th service frame on the simulated mesh (overrides
    /// `[simulation] drop_every`).
    #[arg(long, env = "MESHKEY_DROP_EVERY")]
    drop_every: Option<u32>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies the command-line overrides.
    fn to_node_config(&self) -> anyhow::Result<NodeConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("loading config from {}", self.config.display()))?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut NodeConfig) {
        if let Some(level) = &self.log_level {
            config.node.log_level = level.clone();
        }
        if let Some(n) = self.drop_every {
            config.simulation.drop_every = n;
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The sessions share an `Rc`-based simulated mesh, so everything runs on a
/// current-thread runtime.  Only the Ctrl+C listener is spawned.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.to_node_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.node.log_level)),
        )
        .init();

    if cli.write_config {
        save_config(&cli.config, &config)
            .with_context(|| format!("writing config to {}", cli.config.display()))?;
        info!(path = %cli.config.display(), "configuration written");
        return Ok(());
    }

    let period = config.tick_period().context("invalid tick period")?;
    let mut pair: NodePair<Stdout> =
        NodePair::new(&config, std::io::stdout()).context("building node pair")?;

    info!(tick_ms = config.network.tick_ms, "MeshKey node pair starting");

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    pair.start().context("bringing the network up")?;

    // ── Main loop ─────────────────────────────────────────────────────────────
    //
    // One tick per period.  Stdin lines are queued as they arrive; once
    // stdin closes the loop runs until every queued key is acknowledged.
    let mut ticker = tokio::time::interval(period);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    while running.load(Ordering::Relaxed) {
        tokio::select! {
            _ = ticker.tick() => {
                pair.step().context("advancing node pair")?;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("reading stdin")? {
                    Some(text) => {
                        let queued = pair.type_text(&text) + pair.type_text("\n");
                        debug!(queued, "line queued");
                    }
                    None => {
                        stdin_open = false;
                        info!("stdin closed; finishing queued keys");
                    }
                }
            }
        }
        if !stdin_open && pair.is_idle() {
            break;
        }
    }

    info!(
        ticks = pair.ticks(),
        rendered = pair.display().rendered(),
        dropped = pair.mesh().dropped_frames(),
        "MeshKey node pair stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_use_meshkey_toml() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["meshkey-node"]);

        // Assert
        assert_eq!(cli.config, PathBuf::from("meshkey.toml"));
        assert_eq!(cli.log_level, None);
        assert_eq!(cli.drop_every, None);
        assert!(!cli.write_config);
    }

    #[test]
    fn test_written_config_loads_back_with_overrides() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("meshkey_cli_{}", std::process::id()));
        let path = dir.join("meshkey.toml");
        let path_arg = path.to_string_lossy().into_owned();
        let cli = Cli::parse_from([
            "meshkey-node",
            "--config",
            path_arg.as_str(),
            "--drop-every",
            "5",
            "--write-config",
        ]);

        // Act
        let config = cli.to_node_config().expect("defaults plus overrides");
        save_config(&cli.config, &config).expect("save");
        let reloaded = load_config(&path).expect("load");

        // Assert
        assert!(cli.write_config);
        assert_eq!(reloaded.simulation.drop_every, 5);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cli_custom_values_are_parsed() {
        let cli = Cli::parse_from([
            "meshkey-node",
            "--config",
            "/tmp/node.toml",
            "--log-level",
            "debug",
            "--drop-every",
            "4",
        ]);

        assert_eq!(cli.config, PathBuf::from("/tmp/node.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.drop_every, Some(4));
    }

    #[test]
    fn test_overrides_replace_config_values() {
        // Arrange
        let cli = Cli::parse_from(["meshkey-node", "--log-level", "trace", "--drop-every", "3"]);
        let mut config = NodeConfig::default();

        // Act
        cli.apply_overrides(&mut config);

        // Assert
        assert_eq!(config.node.log_level, "trace");
        assert_eq!(config.simulation.drop_every, 3);
    }

    #[test]
    fn test_absent_overrides_keep_config_values() {
        let cli = Cli::parse_from(["meshkey-node"]);
        let mut config = NodeConfig::default();
        config.simulation.drop_every = 7;

        cli.apply_overrides(&mut config);

        assert_eq!(config.simulation.drop_every, 7);
        assert_eq!(config.node.log_level, "info");
    }

    #[test]
    fn test_to_node_config_with_missing_file_yields_defaults() {
        let cli = Cli::parse_from([
            "meshkey-node",
            "--config",
            "/nonexistent/path/that/cannot/exist/meshkey.toml",
        ]);

        let config = cli.to_node_config().expect("defaults");

        assert_eq!(config, NodeConfig::default());
    }
}
