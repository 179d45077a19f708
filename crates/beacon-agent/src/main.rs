//! Beacon agent: batches telemetry events read from stdin.
//!
//! Each stdin line is tracked as one event (`<type> <data>`). Events are
//! held for the configured cooldown and then POSTed to the collector as a
//! single batch. Pending events are kept in a local file store, so anything
//! not yet delivered when the agent exits is sent on the next run.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `beacon-config.yaml` (or `BEACON_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the file store and the HTTP transport
//! 4. Open the batcher (restores pending events)
//! 5. Track stdin lines until EOF, a read error, or Ctrl-C
//! 6. Close the batcher (persists pending events, no network flush)

mod error;
mod input;

use std::path::PathBuf;

use beacon_core::{Batcher, BeaconConfig, FileStore, HttpTransport, LogFormat};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AgentError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "beacon-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if initialization fails or the final persist fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run().await?;
    Ok(())
}

async fn run() -> Result<(), AgentError> {
    // 1. Configuration.
    let (config, config_source) = load_config()?;

    // 2. Logging.
    init_logging(&config)?;
    info!("beacon-agent starting");
    info!(
        source = %config_source,
        server_url = config.transport.server_url,
        cooldown_ms = config.batcher.cooldown_before_send_ms,
        storage_key = config.batcher.storage_key,
        store_path = %config.storage.path.display(),
        "configuration loaded"
    );

    // 3. Collaborators.
    let store = FileStore::new(config.storage.path.clone());
    let transport = HttpTransport::new(&config.transport)?;

    // 4. Batcher.
    let batcher = Batcher::open(config.batcher.clone(), store, transport)?;

    // 5. Track stdin until EOF, a read error, or interrupt.
    let stdin = BufReader::new(tokio::io::stdin());
    let tracked = input::track_lines(stdin, &batcher, tokio::signal::ctrl_c()).await;
    info!(tracked = tracked, "input finished");

    // 6. Persist whatever is still pending.
    let pending = batcher.close()?;
    info!(pending = pending, "beacon-agent shutdown complete");
    Ok(())
}

/// Load configuration from `BEACON_CONFIG` or `beacon-config.yaml`.
///
/// A missing file is not an error: defaults are used, with environment
/// overrides still applied.
fn load_config() -> Result<(BeaconConfig, String), AgentError> {
    let path = std::env::var("BEACON_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        let config = BeaconConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = BeaconConfig::default();
        config.apply_env_overrides()?;
        Ok((config, "defaults".to_owned()))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(config: &BeaconConfig) -> Result<(), AgentError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let result = match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    result.map_err(|e| AgentError::Logging {
        message: format!("{e}"),
    })
}
