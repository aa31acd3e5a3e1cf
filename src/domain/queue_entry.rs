//! One simulated participant in a clinic queue.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntryId;

/// Lifecycle status of a [`QueueEntry`].
///
/// `waiting → in-session → completed`. `your-turn` marks the current user's
/// entry while it waits; it leaves that state through the same promotion
/// and completion rules as `waiting`. `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    /// Waiting to be called.
    Waiting,
    /// Currently with the doctor.
    InSession,
    /// The current user's entry, next in line behind the active session(s).
    YourTurn,
    /// Consultation finished. Terminal.
    Completed,
}

impl EntryStatus {
    /// Returns the persisted string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InSession => "in-session",
            Self::YourTurn => "your-turn",
            Self::Completed => "completed",
        }
    }

    /// `true` for the terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// `true` for statuses that carry a wait estimate.
    #[must_use]
    pub const fn awaits_turn(self) -> bool {
        matches!(self, Self::Waiting | Self::YourTurn)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row of the live queue.
///
/// Field names are persisted in camelCase. Fields this type does not know
/// about are kept in [`QueueEntry::extra`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Stable identifier, unique within a snapshot.
    pub id: EntryId,

    /// Display name.
    pub name: String,

    /// 1-based rank, unique within a snapshot.
    pub position: u32,

    /// Lifecycle status.
    pub status: EntryStatus,

    /// Estimated minutes until this entry is seen. Only meaningful while
    /// [`EntryStatus::awaits_turn`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time_minutes: Option<u32>,

    /// Marks the entry belonging to the signed-in user.
    #[serde(default)]
    pub is_current_user: bool,

    /// Descriptive booking time, not used in scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,

    /// Descriptive contact address, not used in scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_email: Option<String>,

    /// Unrecognised fields carried through from storage.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueueEntry {
    /// Creates an entry with no wait estimate and no descriptive fields.
    #[must_use]
    pub fn new(id: EntryId, name: impl Into<String>, position: u32, status: EntryStatus) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            status,
            wait_time_minutes: None,
            is_current_user: false,
            appointment_time: None,
            patient_email: None,
            extra: Map::new(),
        }
    }

    /// Marks this entry as the current user's.
    #[must_use]
    pub fn current_user(mut self) -> Self {
        self.is_current_user = true;
        self
    }

    /// Sets the wait estimate.
    #[must_use]
    pub const fn with_wait(mut self, minutes: u32) -> Self {
        self.wait_time_minutes = Some(minutes);
        self
    }

    /// `true` unless the entry has completed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
