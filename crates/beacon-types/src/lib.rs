//! Shared type definitions for the Beacon telemetry batcher.
//!
//! These are the only types that cross a process boundary: the same JSON
//! shape is POSTed to the collector and written to local storage as the
//! pending-events snapshot. `TypeScript` bindings are generated via `ts-rs`
//! so collector-side code can share the schema.
//!
//! # Modules
//!
//! - [`event`] -- A single tracked `(type, data)` record
//! - [`batch`] -- The ordered collection used for wire and storage

pub mod batch;
pub mod event;

pub use batch::EventBatch;
pub use event::EventRecord;
