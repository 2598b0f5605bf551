//! Underlying string key-value stores
//!
//! [`KeyValueStore`] is the minimal synchronous contract the compressed
//! store is layered on. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: in-process map with an optional byte quota
//! - [`FileStore`]: the same map persisted as a JSON file, written through
//!   on every mutation
//!
//! Quotas count the UTF-8 length of keys plus values, the way browser
//! storage does. A write that would exceed the quota fails with
//! [`BackendError::QuotaExceeded`] and leaves the store unchanged.

use crate::storage::error::{BackendError, BackendResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Synchronous string-keyed, string-valued store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Insert or overwrite; may fail with [`BackendError::QuotaExceeded`]
    fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    fn remove(&self, key: &str) -> BackendResult<()>;

    /// Every key in the store, including ones this crate did not write
    fn keys(&self) -> BackendResult<Vec<String>>;

    fn len(&self) -> BackendResult<usize>;

    fn is_empty(&self) -> BackendResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        (**self).keys()
    }

    fn len(&self) -> BackendResult<usize> {
        (**self).len()
    }
}

/// Map plus usage accounting shared by both stores
#[derive(Debug, Default)]
struct Entries {
    map: BTreeMap<String, String>,
    used: usize,
    quota: Option<usize>,
}

impl Entries {
    fn with_quota(quota: Option<usize>) -> Self {
        Self {
            quota,
            ..Default::default()
        }
    }

    fn from_map(map: BTreeMap<String, String>, quota: Option<usize>) -> Self {
        let used = map.iter().map(|(k, v)| entry_size(k, v)).sum();
        Self { map, used, quota }
    }

    /// Insert, returning the previous value
    fn insert(&mut self, key: &str, value: &str) -> BackendResult<Option<String>> {
        let requested = entry_size(key, value);
        let released = self
            .map
            .get(key)
            .map(|old| entry_size(key, old))
            .unwrap_or(0);
        let next_used = self.used - released + requested;

        if let Some(quota) = self.quota {
            if next_used > quota {
                return Err(BackendError::QuotaExceeded {
                    key: key.to_string(),
                    requested,
                    quota,
                });
            }
        }

        self.used = next_used;
        Ok(self.map.insert(key.to_string(), value.to_string()))
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let old = self.map.remove(key)?;
        self.used -= entry_size(key, &old);
        Some(old)
    }

    /// Undo an `insert`/`remove` of `key` given the value it replaced
    fn restore(&mut self, key: &str, previous: Option<String>) {
        self.remove(key);
        if let Some(value) = previous {
            self.used += entry_size(key, &value);
            self.map.insert(key.to_string(), value);
        }
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

fn lock_error<E: std::fmt::Display>(err: E) -> BackendError {
    BackendError::Lock(err.to_string())
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses writes once keys + values exceed `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::with_quota(Some(quota))),
        }
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> BackendResult<usize> {
        Ok(self.entries.read().map_err(lock_error)?.used)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.map.keys().cloned().collect())
    }

    fn len(&self) -> BackendResult<usize> {
        Ok(self.entries.read().map_err(lock_error)?.map.len())
    }
}

/// Persistent store backed by a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Entries>,
}

impl FileStore {
    /// Open the store at `path`, creating it (and parent directories) on first write
    pub fn open(path: impl AsRef<Path>) -> BackendResult<Self> {
        Self::open_with_quota(path, None)
    }

    pub fn open_with_quota(path: impl AsRef<Path>, quota: Option<usize>) -> BackendResult<Self> {
        let path = path.as_ref().to_path_buf();

        let map: BTreeMap<String, String> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::info!("Opened file store {:?} with {} keys", path, map.len());

        Ok(Self {
            path,
            entries: RwLock::new(Entries::from_map(map, quota)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &Entries) -> BackendResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&entries.map)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let previous = entries.insert(key, value)?;

        if let Err(e) = self.persist(&entries) {
            entries.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.restore(key, Some(previous));
            return Err(e);
        }
        Ok(())
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.map.keys().cloned().collect())
    }

    fn len(&self) -> BackendResult<usize> {
        Ok(self.entries.read().map_err(lock_error)?.map.len())
    }
}
