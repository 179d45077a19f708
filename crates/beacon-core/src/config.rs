//! Configuration loading and typed config structures.
//!
//! The configuration lives in `beacon-config.yaml`. Every field has a
//! default, so a missing file or a partial file is valid. A few
//! environment variables override file values after parsing:
//!
//! - `BEACON_SERVER_URL` overrides `transport.server_url`
//! - `BEACON_COOLDOWN_MS` overrides `batcher.cooldown_before_send_ms`
//! - `BEACON_STORE_PATH` overrides `storage.path`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {reason}")]
    InvalidEnv {
        /// The environment variable name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A value parsed but cannot drive the batcher.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// The offending config field.
        field: &'static str,
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `beacon-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BeaconConfig {
    /// Debounce and persistence settings.
    #[serde(default)]
    pub batcher: BatcherConfig,

    /// Collector endpoint settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BeaconConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] if an override is malformed.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `BEACON_*` environment overrides in place.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if `BEACON_COOLDOWN_MS` is not
    /// an integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("BEACON_SERVER_URL") {
            self.transport.server_url = val;
        }
        if let Ok(val) = std::env::var("BEACON_COOLDOWN_MS") {
            self.batcher.cooldown_before_send_ms =
                val.parse().map_err(|e| ConfigError::InvalidEnv {
                    name: "BEACON_COOLDOWN_MS",
                    reason: format!("{e}"),
                })?;
        }
        if let Ok(val) = std::env::var("BEACON_STORE_PATH") {
            self.storage.path = PathBuf::from(val);
        }
        Ok(())
    }
}

/// Debounce window and snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatcherConfig {
    /// Quiet period, measured from the first event of a burst, before the
    /// accumulated events are flushed.
    #[serde(default = "default_cooldown_before_send_ms")]
    pub cooldown_before_send_ms: u64,

    /// Key under which the pending-events snapshot is stored.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

impl BatcherConfig {
    /// The debounce window as a [`Duration`].
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_before_send_ms)
    }

    /// Check that the configuration can drive a batcher.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first problem found: a zero
    /// cooldown or an empty storage key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_before_send_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "batcher.cooldown_before_send_ms",
                reason: "must be at least 1",
            });
        }
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "batcher.storage_key",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            cooldown_before_send_ms: default_cooldown_before_send_ms(),
            storage_key: default_storage_key(),
        }
    }
}

/// Collector endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// URL that receives the `POST` of each batch.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Per-request timeout in milliseconds. `0` disables the timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl TransportConfig {
    /// The request timeout, or `None` when disabled.
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.request_timeout_ms))
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Local key-value storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Path of the file backing the key-value store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

const fn default_cooldown_before_send_ms() -> u64 {
    2_000
}

fn default_storage_key() -> String {
    "pendingEvents".to_owned()
}

fn default_server_url() -> String {
    "https://your-analytics-server.com/events".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("beacon-store.json")
}

fn default_log_level() -> String {
    "info".to_owned()
}
