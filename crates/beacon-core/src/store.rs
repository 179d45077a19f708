//! Durable key-value storage for the pending-events snapshot.
//!
//! The batcher only ever needs two operations on one key: read the last
//! snapshot at open, and overwrite it wholesale after each flush attempt
//! and at close. Both are synchronous so that close can persist without a
//! runtime.
//!
//! | Implementation | Backing | Use |
//! |----------------|---------|-----|
//! | [`MemoryStore`] | `HashMap` | tests, embedded use |
//! | [`FileStore`] | JSON object file | the agent binary |

use std::collections::{BTreeMap, HashMap};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::StoreError;

/// A persistent key-value store.
pub trait Store: Send + Sync + 'static {
    /// Read the value stored under `key`, or `None` if the key is absent.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the value stored under `key`.
    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with one entry.
    pub fn with_entry(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
        store
    }

    /// Read a value as a UTF-8 string, for assertions and diagnostics.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// A store backed by a single JSON file mapping keys to string values.
///
/// Writes go to a sibling temp file, which is flushed to disk and then
/// renamed over the original. A crash or power loss mid-write leaves the
/// previous contents intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.read_entries()?;
        Ok(entries.get(key).map(|v| v.clone().into_bytes()))
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let value = std::str::from_utf8(value).map_err(|_utf8| StoreError::InvalidUtf8 {
            key: key.to_owned(),
        })?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Corrupt(e)) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is corrupt, rewriting from scratch"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        entries.insert(key.to_owned(), value.to_owned());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&serde_json::to_vec_pretty(&entries)?)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            key = key,
            bytes = value.len(),
            "store entry written"
        );
        Ok(())
    }
}
