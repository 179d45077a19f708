//! Ordered collection of events, serialized as `{"events": [...]}`.
//!
//! One shape serves both destinations: the HTTP request body sent to the
//! collector and the pending-events snapshot kept in local storage.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::event::EventRecord;

/// An ordered batch of events.
///
/// Insertion order is preserved and duplicates are allowed. A stored batch
/// without an `events` field decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventBatch {
    /// Events in the order they were tracked.
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl EventBatch {
    /// Create a batch from an ordered list of events.
    pub const fn new(events: Vec<EventRecord>) -> Self {
        Self { events }
    }

    /// Number of events in the batch.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the batch holds no events.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Encode as compact UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if encoding fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from UTF-8 JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the bytes are not a valid batch.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl IntoIterator for EventBatch {
    type Item = EventRecord;
    type IntoIter = std::vec::IntoIter<EventRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_matches_collector_contract() {
        let batch = EventBatch::new(vec![
            EventRecord::new("click", "btn1"),
            EventRecord::new("click", "btn2"),
        ]);
        let bytes = batch.to_json_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"events":[{"type":"click","data":"btn1"},{"type":"click","data":"btn2"}]}"#
        );
    }

    #[test]
    fn empty_batch_encodes_as_empty_array() {
        let bytes = EventBatch::default().to_json_bytes().unwrap();
        assert_eq!(bytes, br#"{"events":[]}"#);
    }

    #[test]
    fn missing_events_field_decodes_as_empty() {
        let batch = EventBatch::from_json_slice(b"{}").unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn preserves_order_and_duplicates() {
        let json = br#"{"events":[{"type":"a","data":"1"},{"type":"b","data":"2"},{"type":"a","data":"1"}]}"#;
        let batch = EventBatch::from_json_slice(json).unwrap();
        assert_eq!(batch.len(), 3);
        let types: Vec<&str> = batch.events.iter().map(EventRecord::event_type).collect();
        assert_eq!(types, ["a", "b", "a"]);
        assert_eq!(batch.events.first(), batch.events.get(2));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(EventBatch::from_json_slice(b"not json").is_err());
        assert!(EventBatch::from_json_slice(br#"{"events":[{"type":1}]}"#).is_err());
    }
}
