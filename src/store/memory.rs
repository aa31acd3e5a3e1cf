//! In-process record store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::RecordStore;
use crate::error::QueueError;

/// [`RecordStore`] held in a `RwLock<HashMap<..>>`.
///
/// Contents vanish with the process, like a browser session's storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    /// `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        Ok(self.records.read().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), QueueError> {
        self.records
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, QueueError> {
        Ok(self.records.write().map_err(poisoned)?.remove(key).is_some())
    }
}

fn poisoned<T>(_: T) -> QueueError {
    QueueError::Store("memory store lock poisoned".to_string())
}
