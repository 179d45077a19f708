//! The unit of telemetry: one `(type, data)` record.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single tracked event.
///
/// Records carry no identifier. Two records with the same type and data are
/// distinct events; only their position in a queue or batch tells them
/// apart. Fields are private so a record cannot be altered after it has
/// been tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventRecord {
    /// Caller-defined event category (e.g. `"click"`).
    #[serde(rename = "type")]
    event_type: String,

    /// Free-form payload, opaque to the batcher.
    data: String,
}

impl EventRecord {
    /// Create a new record.
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// The event category.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event payload.
    pub fn data(&self) -> &str {
        &self.data
    }
}

impl core::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.event_type, self.data)
    }
}
