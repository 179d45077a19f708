//! Error types for the agent binary.

/// Top-level error for the agent binary.
///
/// Wraps each subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: beacon_core::ConfigError,
    },

    /// The HTTP transport could not be built.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: beacon_core::TransportError,
    },

    /// The batcher could not be opened or closed cleanly.
    #[error("batcher error: {source}")]
    Batcher {
        /// The underlying batcher error.
        #[from]
        source: beacon_core::BatcherError,
    },

    /// The log subscriber could not be installed.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}
