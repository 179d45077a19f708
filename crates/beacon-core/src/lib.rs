//! Event queue, debounce timer, and send-and-persist protocol for Beacon.
//!
//! Callers [`track`](batcher::Batcher::track) events; the batcher holds them
//! for a fixed cooldown measured from the first event of a burst, then
//! submits everything queued as one JSON batch. Pending events are
//! persisted after every attempt and at close, so they survive restarts and
//! collector outages. Delivery is at-least-once.
//!
//! # Architecture
//!
//! ```text
//! track() --> EventQueue --(cooldown)--> Transport::submit
//!                 |                            |
//!                 +<----- remove sent prefix --+ (200 OK)
//!                 |
//!                 +--> Store::save (after every attempt, and at close)
//! ```
//!
//! # Modules
//!
//! - [`batcher`] -- The [`Batcher`] state machine and its lifecycle
//! - [`queue`] -- Ordered queue of undelivered events
//! - [`store`] -- [`Store`] trait with memory and file implementations
//! - [`transport`] -- [`Transport`] trait and the HTTP implementation
//! - [`config`] -- `beacon-config.yaml` loading
//! - [`error`] -- Error types

pub mod batcher;
pub mod config;
pub mod error;
pub mod queue;
pub mod store;
pub mod transport;

pub use batcher::{Batcher, FlushOutcome};
pub use config::{BatcherConfig, BeaconConfig, ConfigError, LogFormat, TransportConfig};
pub use error::{BatcherError, StoreError, TransportError};
pub use queue::EventQueue;
pub use store::{FileStore, MemoryStore, Store};
pub use transport::{HttpTransport, Transport};
