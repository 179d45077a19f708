//! The ordered queue of events not yet confirmed delivered.
//!
//! The queue is the single source of truth for both the send path and the
//! persist path. Only the front is ever removed (the prefix a successful
//! send covered) and only the back is ever appended to, so relative order
//! survives any interleaving of tracks and flushes.

use beacon_types::{EventBatch, EventRecord};

/// Pending events in `track` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQueue {
    events: Vec<EventRecord>,
}

impl EventQueue {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add a record to the back.
    pub fn append(&mut self, record: EventRecord) {
        self.events.push(record);
    }

    /// Copy the current contents for an in-flight send.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.events.clone()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Remove the first `count` records, returning how many were removed.
    ///
    /// Used after a successful send to drop exactly the snapshotted prefix;
    /// records appended while the send was in flight stay queued.
    pub fn remove_front(&mut self, count: usize) -> usize {
        let count = count.min(self.events.len());
        self.events.drain(..count);
        count
    }

    /// Append a decoded batch after the current contents, keeping batch
    /// order.
    pub fn load_into(&mut self, batch: EventBatch) {
        self.events.extend(batch);
    }

    /// Number of queued records.
    pub const fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub const fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Contents as a batch, for persistence.
    pub fn to_batch(&self) -> EventBatch {
        EventBatch::new(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(data: &str) -> EventRecord {
        EventRecord::new("click", data)
    }

    #[test]
    fn append_preserves_order() {
        let mut queue = EventQueue::new();
        queue.append(click("a"));
        queue.append(click("b"));
        queue.append(click("a"));
        assert_eq!(queue.snapshot(), vec![click("a"), click("b"), click("a")]);
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let mut queue = EventQueue::new();
        queue.append(click("a"));
        let snapshot = queue.snapshot();
        queue.append(click("b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_front_keeps_events_appended_after_snapshot() {
        let mut queue = EventQueue::new();
        queue.append(click("a"));
        queue.append(click("b"));
        let snapshot = queue.snapshot();
        queue.append(click("c"));

        assert_eq!(queue.remove_front(snapshot.len()), 2);
        assert_eq!(queue.snapshot(), vec![click("c")]);
    }

    #[test]
    fn remove_front_saturates() {
        let mut queue = EventQueue::new();
        queue.append(click("a"));
        assert_eq!(queue.remove_front(5), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn load_into_appends_without_clearing() {
        let mut queue = EventQueue::new();
        queue.append(click("live"));
        queue.load_into(EventBatch::new(vec![click("old1"), click("old2")]));
        assert_eq!(
            queue.snapshot(),
            vec![click("live"), click("old1"), click("old2")]
        );
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = EventQueue::new();
        queue.append(click("a"));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.to_batch().is_empty());
    }
}
