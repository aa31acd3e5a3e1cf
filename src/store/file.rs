//! JSON-file record store.
//!
//! The whole store is one JSON object on disk mapping keys to the raw JSON
//! text of each record, the same shape browser local storage exposes. Each
//! operation re-reads the file under an advisory lock on a sibling
//! `.lock` file, so handles in other threads or processes never interleave
//! a read-modify-write. Writes go to a unique temporary file in the same
//! directory, are synced, then renamed over the store file.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use tempfile::NamedTempFile;

use super::RecordStore;
use crate::error::QueueError;

type RecordMap = BTreeMap<String, String>;

/// [`RecordStore`] persisted to a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes operations on this handle.
    guard: Mutex<()>,
}

/// Advisory lock on the store's `.lock` file, released on drop.
#[derive(Debug)]
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(lock_path: &Path, exclusive: bool) -> Result<Self, QueueError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| {
            QueueError::Store(format!("failed to lock {}: {e}", lock_path.display()))
        })?;
        Ok(Self { _file: file })
    }
}

impl JsonFileStore {
    /// Opens a store at `path`, creating parent directories as needed. The
    /// file itself is created on first write.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Io`] if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self {
            path,
            lock_path,
            guard: Mutex::new(()),
        })
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    fn load(&self) -> Result<RecordMap, QueueError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RecordMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(RecordMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file unreadable, treating as empty"
                );
                Ok(RecordMap::new())
            }
        }
    }

    fn save(&self, map: &RecordMap) -> Result<(), QueueError> {
        let body = serde_json::to_vec_pretty(map)?;
        let mut tmp = NamedTempFile::new_in(self.directory())?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn locked(&self, exclusive: bool) -> Result<(MutexGuard<'_, ()>, StoreLock), QueueError> {
        let guard = self
            .guard
            .lock()
            .map_err(|_| QueueError::Store("file store lock poisoned".to_string()))?;
        let lock = StoreLock::acquire(&self.lock_path, exclusive)?;
        Ok((guard, lock))
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        let _lock = self.locked(false)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), QueueError> {
        let _lock = self.locked(true)?;
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.save(&map)
    }

    fn remove(&self, key: &str) -> Result<bool, QueueError> {
        let _lock = self.locked(true)?;
        let mut map = self.load()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.save(&map)?;
        }
        Ok(existed)
    }
}
