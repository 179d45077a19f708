//! Error types for the batcher and its collaborators.
//!
//! None of these ever reach a caller of [`Batcher::track`]; they surface
//! through `tracing` and through the explicit lifecycle calls
//! ([`Batcher::open`], [`Batcher::close`]).
//!
//! [`Batcher::track`]: crate::batcher::Batcher::track
//! [`Batcher::open`]: crate::batcher::Batcher::open
//! [`Batcher::close`]: crate::batcher::Batcher::close

use crate::config::ConfigError;

/// Errors raised by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a valid key-value document.
    #[error("store file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A stored value is not valid UTF-8.
    #[error("stored value under {key} is not valid UTF-8")]
    InvalidUtf8 {
        /// The key whose value could not be decoded.
        key: String,
    },
}

/// Errors raised by a [`Transport`](crate::transport::Transport) submission.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The request never produced a response (unreachable, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// The collector answered with something other than `200 OK`.
    #[error("collector returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated), kept as the diagnostic.
        body: String,
    },
}

/// Errors surfaced by the batcher lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum BatcherError {
    /// [`Batcher::open`](crate::batcher::Batcher::open) was called outside
    /// a tokio runtime, so the cooldown timer has nowhere to run.
    #[error("batcher must be opened inside a tokio runtime")]
    NoRuntime,

    /// The operation needs the queue to be quiescent but a flush is running.
    #[error("a flush is in progress")]
    SendInProgress,

    /// The batcher configuration is unusable.
    #[error("invalid batcher configuration: {0}")]
    InvalidConfig(#[source] ConfigError),

    /// Persisting the pending-events snapshot failed.
    #[error("persist failed: {0}")]
    Store(#[from] StoreError),

    /// Encoding the pending-events snapshot failed.
    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}
