//! The batcher: queue, debounce timer, send guard, and persistence.
//!
//! # Lifecycle
//!
//! ```text
//! open() --> track()* --> close()
//!   |          |            |
//!   |          |            +-- cancel cooldown, persist queue (no network)
//!   |          +-- append, arm cooldown if idle
//!   +-- load persisted snapshot into the queue
//! ```
//!
//! # Cooldown
//!
//! The first `track` of a burst moves the batcher from `Idle` to
//! `CoolingDown` and spawns one sleep task. Later tracks only append. When
//! the sleep ends the batcher is `Idle` again and, if anything is queued
//! and no send is running, a flush starts. The window is therefore
//! measured from the first event of a burst, not the last.
//!
//! # Flush
//!
//! 1. Under the state lock: check and set the send flag, snapshot the queue.
//! 2. Encode the snapshot and submit it (lock released).
//! 3. Success: drop exactly the snapshotted prefix. Failure: leave the
//!    queue alone.
//! 4. Persist the queue on the blocking pool, then clear the send flag.
//!
//! A trigger that finds a send already running is dropped; whatever it
//! would have sent is still queued for the next cycle. There is no
//! backoff and no retry cap: a batch the collector keeps rejecting is
//! resent, together with everything queued after it, on every flush.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use beacon_types::{EventBatch, EventRecord};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BatcherConfig;
use crate::error::BatcherError;
use crate::queue::EventQueue;
use crate::store::Store;
use crate::transport::Transport;

/// Result of one flush trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The collector accepted this many events; they left the queue.
    Delivered(usize),
    /// Submission of this many events failed; they are still queued.
    Failed(usize),
    /// Nothing was queued.
    Empty,
    /// Another flush was already running, so this trigger was dropped.
    AlreadyInFlight,
    /// The batcher has been closed.
    Closed,
}

/// Debounce timer state.
#[derive(Debug, Default)]
enum Cooldown {
    /// No timer running.
    #[default]
    Idle,
    /// A timer is running; it flushes when it fires.
    CoolingDown(JoinHandle<()>),
}

/// Everything guarded by the state lock.
#[derive(Debug, Default)]
struct BatcherState {
    queue: EventQueue,
    cooldown: Cooldown,
    sending: bool,
    closed: bool,
}

struct Inner<S, T> {
    config: BatcherConfig,
    store: S,
    transport: T,
    runtime: Handle,
    state: Mutex<BatcherState>,
    /// Serializes snapshot writes so the newest queue state is written last.
    persist_lock: Mutex<()>,
}

/// Client-side event batcher.
///
/// Cheap to clone; all clones share one queue. [`track`](Self::track) can
/// be called from any thread and never blocks on I/O.
pub struct Batcher<S, T> {
    inner: Arc<Inner<S, T>>,
}

impl<S, T> Clone for Batcher<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store, T: Transport> Batcher<S, T> {
    /// Open a batcher, restoring any events persisted by a previous run.
    ///
    /// A missing, unreadable, or corrupt snapshot is logged and treated as
    /// "nothing pending". Restored events are not sent until the next
    /// `track` arms the cooldown or [`flush`](Self::flush) is called.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::InvalidConfig`] if `config` fails validation,
    /// or [`BatcherError::NoRuntime`] if called outside a tokio runtime.
    pub fn open(config: BatcherConfig, store: S, transport: T) -> Result<Self, BatcherError> {
        config.validate().map_err(BatcherError::InvalidConfig)?;
        let runtime = Handle::try_current().ok().ok_or(BatcherError::NoRuntime)?;

        let mut queue = EventQueue::new();
        restore_snapshot(&store, &config.storage_key, &mut queue);

        info!(
            pending = queue.len(),
            storage_key = config.storage_key,
            cooldown_ms = config.cooldown_before_send_ms,
            "batcher opened"
        );

        let state = BatcherState {
            queue,
            ..BatcherState::default()
        };

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                transport,
                runtime,
                state: Mutex::new(state),
                persist_lock: Mutex::new(()),
            }),
        })
    }

    /// Record an event.
    ///
    /// Appends to the queue and, if the batcher is idle, starts the
    /// cooldown. Never fails and never waits on the network or storage.
    pub fn track(&self, event_type: impl Into<String>, event_data: impl Into<String>) {
        let record = EventRecord::new(event_type, event_data);
        let mut state = self.inner.lock_state();
        state.queue.append(record);

        if state.closed {
            debug!(
                pending = state.queue.len(),
                "event tracked after close, holding for next persist"
            );
            return;
        }

        if matches!(state.cooldown, Cooldown::Idle) {
            let inner = Arc::clone(&self.inner);
            let handle = self.inner.runtime.spawn(async move {
                inner.run_cooldown().await;
            });
            state.cooldown = Cooldown::CoolingDown(handle);
            debug!(
                pending = state.queue.len(),
                cooldown_ms = self.inner.config.cooldown_before_send_ms,
                "cooldown started"
            );
        }
    }

    /// Run the flush protocol now, without waiting for the cooldown.
    ///
    /// The cooldown, if running, is left alone and will trigger its own
    /// flush when it fires.
    pub async fn flush(&self) -> FlushOutcome {
        let snapshot = {
            let mut state = self.inner.lock_state();
            Inner::<S, T>::begin_send(&mut state)
        };
        match snapshot {
            Ok(snapshot) => self.inner.send(snapshot).await,
            Err(outcome) => {
                debug!(outcome = ?outcome, "flush skipped");
                outcome
            }
        }
    }

    /// Cancel the cooldown and synchronously persist the queue.
    ///
    /// No network flush is attempted. A send already in flight is not
    /// interrupted; it persists again when it finishes. Events tracked
    /// after close stay queued and are written by the next `close`.
    ///
    /// Returns the number of events persisted.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::Store`] or [`BatcherError::Serde`] if the
    /// snapshot could not be written.
    pub fn close(&self) -> Result<usize, BatcherError> {
        {
            let mut state = self.inner.lock_state();
            state.closed = true;
            if let Cooldown::CoolingDown(handle) = std::mem::take(&mut state.cooldown) {
                handle.abort();
                debug!("pending cooldown cancelled");
            }
        }

        let persisted = self.inner.persist()?;
        info!(pending = persisted, "batcher closed");
        Ok(persisted)
    }

    /// Drop every queued event and persist the now-empty queue.
    ///
    /// This is the only way to get rid of a batch the collector keeps
    /// rejecting. Refused while a send is in flight, since the send's
    /// success path removes its snapshot from the front of the queue.
    ///
    /// Returns the number of events discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BatcherError::SendInProgress`] if a flush is running, or a
    /// persistence error if the empty snapshot could not be written.
    pub fn discard_pending(&self) -> Result<usize, BatcherError> {
        let discarded = {
            let mut state = self.inner.lock_state();
            if state.sending {
                return Err(BatcherError::SendInProgress);
            }
            let count = state.queue.len();
            state.queue.clear();
            count
        };
        warn!(discarded = discarded, "pending events discarded");
        self.inner.persist()?;
        Ok(discarded)
    }

    /// Number of events not yet confirmed delivered.
    pub fn pending_count(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Copy of the events not yet confirmed delivered, in order.
    pub fn pending_events(&self) -> Vec<EventRecord> {
        self.inner.lock_state().queue.snapshot()
    }

    /// Whether a cooldown timer is currently running.
    pub fn is_cooling_down(&self) -> bool {
        matches!(self.inner.lock_state().cooldown, Cooldown::CoolingDown(_))
    }

    /// Whether a flush is currently in flight.
    pub fn is_sending(&self) -> bool {
        self.inner.lock_state().sending
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock_state().closed
    }
}

impl<S: Store, T: Transport> Inner<S, T> {
    fn lock_state(&self) -> MutexGuard<'_, BatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for the cooldown, return to idle, then flush if possible.
    async fn run_cooldown(self: Arc<Self>) {
        tokio::time::sleep(self.config.cooldown()).await;

        let snapshot = {
            let mut state = self.lock_state();
            state.cooldown = Cooldown::Idle;
            Self::begin_send(&mut state)
        };

        match snapshot {
            Ok(snapshot) => {
                self.send(snapshot).await;
            }
            Err(outcome) => debug!(outcome = ?outcome, "cooldown expired without flush"),
        }
    }

    /// Claim the send flag and snapshot the queue, or say why not.
    fn begin_send(state: &mut BatcherState) -> Result<Vec<EventRecord>, FlushOutcome> {
        if state.closed {
            return Err(FlushOutcome::Closed);
        }
        if state.sending {
            return Err(FlushOutcome::AlreadyInFlight);
        }
        if state.queue.is_empty() {
            return Err(FlushOutcome::Empty);
        }
        state.sending = true;
        Ok(state.queue.snapshot())
    }

    /// Submit a claimed snapshot and reconcile the queue with the result.
    async fn send(self: &Arc<Self>, snapshot: Vec<EventRecord>) -> FlushOutcome {
        let _guard = SendGuard { inner: &**self };
        let count = snapshot.len();

        let payload = match EventBatch::new(snapshot).to_json_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, events = count, "failed to encode batch");
                self.persist_logged().await;
                return FlushOutcome::Failed(count);
            }
        };

        debug!(events = count, bytes = payload.len(), "submitting batch");

        match self.transport.submit(payload).await {
            Ok(()) => {
                let remaining = {
                    let mut state = self.lock_state();
                    state.queue.remove_front(count);
                    state.queue.len()
                };
                info!(delivered = count, pending = remaining, "batch delivered");
                self.persist_logged().await;
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                error!(error = %e, events = count, "failed to send events");
                self.persist_logged().await;
                FlushOutcome::Failed(count)
            }
        }
    }

    /// Write the whole queue under the configured key.
    fn persist(&self) -> Result<usize, BatcherError> {
        let _writer = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let batch = self.lock_state().queue.to_batch();
        let bytes = batch.to_json_bytes()?;
        self.store.save(&self.config.storage_key, &bytes)?;

        debug!(pending = batch.len(), "pending events persisted");
        Ok(batch.len())
    }

    /// Persist on the blocking pool, logging any failure. Used on the send
    /// path, which runs on a runtime worker.
    async fn persist_logged(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        match self.runtime.spawn_blocking(move || inner.persist()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "failed to persist pending events"),
            Err(e) => error!(error = %e, "persist task did not complete"),
        }
    }
}

/// Clears the send flag when a send finishes or its task is torn down.
struct SendGuard<'a, S, T> {
    inner: &'a Inner<S, T>,
}

impl<S, T> Drop for SendGuard<'_, S, T> {
    fn drop(&mut self) {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sending = false;
    }
}

/// Load the persisted batch under `key` into `queue`, logging any problem.
fn restore_snapshot<S: Store>(store: &S, key: &str, queue: &mut EventQueue) {
    let bytes = match store.load(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(storage_key = key, "no persisted events");
            return;
        }
        Err(e) => {
            warn!(storage_key = key, error = %e, "failed to read persisted events, starting empty");
            return;
        }
    };

    match EventBatch::from_json_slice(&bytes) {
        Ok(batch) => {
            debug!(restored = batch.len(), "persisted events restored");
            queue.load_into(batch);
        }
        Err(e) => {
            warn!(storage_key = key, error = %e, "persisted events are corrupt, starting empty");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::store::MemoryStore;

    #[test]
    fn begin_send_claims_flag_once() {
        let mut state = BatcherState::default();
        state.queue.append(EventRecord::new("click", "a"));

        let first = Inner::<MemoryStore, NeverTransport>::begin_send(&mut state);
        assert_eq!(first.unwrap().len(), 1);
        assert!(state.sending);

        let second = Inner::<MemoryStore, NeverTransport>::begin_send(&mut state);
        assert_eq!(second.unwrap_err(), FlushOutcome::AlreadyInFlight);
    }

    #[test]
    fn begin_send_reports_empty_and_closed() {
        let mut state = BatcherState::default();
        assert_eq!(
            Inner::<MemoryStore, NeverTransport>::begin_send(&mut state).unwrap_err(),
            FlushOutcome::Empty
        );
        assert!(!state.sending);

        state.closed = true;
        state.queue.append(EventRecord::new("click", "a"));
        assert_eq!(
            Inner::<MemoryStore, NeverTransport>::begin_send(&mut state).unwrap_err(),
            FlushOutcome::Closed
        );
    }

    #[test]
    fn restore_snapshot_handles_missing_and_corrupt_data() {
        let mut queue = EventQueue::new();
        restore_snapshot(&MemoryStore::new(), "pendingEvents", &mut queue);
        assert!(queue.is_empty());

        let corrupt = MemoryStore::with_entry("pendingEvents", "{\"events\": [oops");
        restore_snapshot(&corrupt, "pendingEvents", &mut queue);
        assert!(queue.is_empty());

        let valid = MemoryStore::with_entry(
            "pendingEvents",
            r#"{"events":[{"type":"click","data":"a"},{"type":"click","data":"b"}]}"#,
        );
        restore_snapshot(&valid, "pendingEvents", &mut queue);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn open_outside_runtime_fails() {
        let result = Batcher::open(BatcherConfig::default(), MemoryStore::new(), NeverTransport);
        assert!(matches!(result, Err(BatcherError::NoRuntime)));
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = BatcherConfig {
            cooldown_before_send_ms: 0,
            ..BatcherConfig::default()
        };
        let result = Batcher::open(config, MemoryStore::new(), NeverTransport);
        assert!(matches!(
            result,
            Err(BatcherError::InvalidConfig(ConfigError::Invalid {
                field: "batcher.cooldown_before_send_ms",
                ..
            }))
        ));
    }

    /// Transport for tests that never reach the network.
    struct NeverTransport;

    impl Transport for NeverTransport {
        async fn submit(&self, _payload: Vec<u8>) -> Result<(), crate::error::TransportError> {
            Err(crate::error::TransportError::Request("unused".to_owned()))
        }
    }
}
