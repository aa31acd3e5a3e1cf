//! Persistence layer: a string-keyed store of JSON records.
//!
//! Mirrors browser local storage: every key maps to one JSON document,
//! reads and writes are whole-record, and there are no transactions. Two
//! writers sharing a backend overwrite each other (last write wins).
//!
//! [`read_record`] separates "absent" from "present but unusable" so that
//! callers can fail open on malformed data instead of erroring.

pub mod file;
pub mod memory;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::QueueError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Well-known record keys.
pub mod keys {
    /// `{ id, displayName }` of the signed-in user.
    pub const CURRENT_USER: &str = "currentUser";
    /// The booking the user is currently queued for (read-only here).
    pub const CURRENT_APPOINTMENT: &str = "currentAppointment";
    /// All bookings (read-only here).
    pub const APPOINTMENTS: &str = "appointments";
    /// The live queue snapshot (owned by the queue service).
    pub const QUEUE_SNAPSHOT: &str = "queueSnapshot";
}

/// Key-value record storage.
///
/// Values are raw JSON text; typed access goes through [`read_record`] and
/// [`write_record`].
pub trait RecordStore: fmt::Debug + Send + Sync {
    /// Returns the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, QueueError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be written.
    fn set(&self, key: &str, value: String) -> Result<(), QueueError>;

    /// Deletes `key`. Returns `true` if a value was present.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<bool, QueueError>;
}

/// Outcome of a typed record read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// No value under the key.
    Missing,
    /// A value exists but does not decode as `T`.
    Malformed(String),
    /// The decoded record.
    Found(T),
}

impl<T> Lookup<T> {
    /// Returns the record if it was found.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing | Self::Malformed(_) => None,
        }
    }
}

/// Reads and decodes the record under `key`.
///
/// # Errors
///
/// Returns an error only if the backend itself fails; undecodable JSON is
/// reported as [`Lookup::Malformed`].
pub fn read_record<T: DeserializeOwned>(
    store: &dyn RecordStore,
    key: &str,
) -> Result<Lookup<T>, QueueError> {
    let Some(raw) = store.get(key)? else {
        return Ok(Lookup::Missing);
    };
    Ok(match serde_json::from_str(&raw) {
        Ok(value) => Lookup::Found(value),
        Err(e) => Lookup::Malformed(e.to_string()),
    })
}

/// Encodes `value` as JSON and stores it under `key`.
///
/// # Errors
///
/// Returns an error if encoding or the backend write fails.
pub fn write_record<T: Serialize>(
    store: &dyn RecordStore,
    key: &str,
    value: &T,
) -> Result<(), QueueError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw)
}
