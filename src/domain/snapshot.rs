//! Ordered collection of queue entries, persisted as one JSON array.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{EntryId, QueueEntry};
use crate::error::QueueError;

/// The full live queue at a point in time.
///
/// Stored in display order: active entries by ascending position, then
/// completed entries by ascending position (see
/// [`QueueSnapshot::sort_for_display`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueSnapshot {
    entries: Vec<QueueEntry>,
}

impl QueueSnapshot {
    /// Wraps the given entries without reordering them.
    #[must_use]
    pub const fn new(entries: Vec<QueueEntry>) -> Self {
        Self { entries }
    }

    /// Entries in their current order.
    #[must_use]
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Mutable access to the entries.
    pub fn entries_mut(&mut self) -> &mut [QueueEntry] {
        &mut self.entries
    }

    /// Consumes the snapshot, returning its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<QueueEntry> {
        self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks an entry up by id.
    #[must_use]
    pub fn get(&self, id: &EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// The current user's entry, if present.
    #[must_use]
    pub fn current_user(&self) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.is_current_user)
    }

    /// Mutable access to the current user's entry.
    pub fn current_user_mut(&mut self) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.is_current_user)
    }

    /// Number of entries flagged as the current user.
    #[must_use]
    pub fn current_user_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_current_user).count()
    }

    /// Number of non-completed entries ranked ahead of `position`.
    #[must_use]
    pub fn active_ahead_of(&self, position: u32) -> usize {
        self.entries
            .iter()
            .filter(|e| e.is_active() && e.position < position)
            .count()
    }

    /// Number of non-completed entries ranked ahead of the current user,
    /// or `None` when the user is not queued.
    #[must_use]
    pub fn positions_until_turn(&self) -> Option<usize> {
        self.current_user()
            .map(|user| self.active_ahead_of(user.position))
    }

    /// Completed-versus-total progress.
    #[must_use]
    pub fn progress(&self) -> QueueProgress {
        QueueProgress {
            completed: self.entries.iter().filter(|e| !e.is_active()).count(),
            total: self.entries.len(),
        }
    }

    /// Reorders entries for display: ascending position, with every
    /// completed entry moved after every active one. The sort is stable, so
    /// completed entries keep their relative position order.
    pub fn sort_for_display(&mut self) {
        self.entries
            .sort_by_key(|e| (e.status.is_terminal(), e.position));
    }

    /// `true` if the entries are already in display order.
    #[must_use]
    pub fn is_display_ordered(&self) -> bool {
        self.entries.windows(2).all(|pair| match pair {
            [a, b] => (a.status.is_terminal(), a.position) <= (b.status.is_terminal(), b.position),
            _ => true,
        })
    }

    /// Removes and returns the current user's entry. Returns `None`, leaving
    /// the snapshot untouched, when no entry is flagged.
    pub fn remove_current_user(&mut self) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.is_current_user)?;
        Some(self.entries.remove(index))
    }

    /// Checks the structural invariants of a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidSnapshot`] if ids or positions repeat,
    /// a position is zero, or more than one entry is the current user.
    pub fn validate(&self) -> Result<(), QueueError> {
        let mut ids = HashSet::with_capacity(self.entries.len());
        let mut positions = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !ids.insert(&entry.id) {
                return Err(QueueError::InvalidSnapshot(format!(
                    "duplicate entry id {}",
                    entry.id
                )));
            }
            if entry.position == 0 {
                return Err(QueueError::InvalidSnapshot(format!(
                    "entry {} has position 0",
                    entry.id
                )));
            }
            if !positions.insert(entry.position) {
                return Err(QueueError::InvalidSnapshot(format!(
                    "duplicate position {}",
                    entry.position
                )));
            }
        }
        let flagged = self.current_user_count();
        if flagged > 1 {
            return Err(QueueError::InvalidSnapshot(format!(
                "{flagged} entries flagged as current user"
            )));
        }
        Ok(())
    }
}

/// Completed-versus-total counts for the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueProgress {
    /// Entries with status `completed`.
    pub completed: usize,
    /// All entries.
    pub total: usize,
}

impl QueueProgress {
    /// Completion percentage, rounded down. An empty queue reports 0.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = self.completed.saturating_mul(100) / self.total;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}
