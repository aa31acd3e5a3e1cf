//! One step of the queue simulation.
//!
//! [`advance`] runs three phases in order:
//!
//! 1. **Completion**: every `in-session` entry finishes with the configured
//!    probability.
//! 2. **Promotion**: if nothing is in session afterwards, the lowest-position
//!    active entry (`waiting` or `your-turn`) moves into session.
//! 3. **Estimation**: if the current user still awaits their turn, their
//!    wait becomes `active entries ahead × per-patient minutes`, with the
//!    per-patient figure drawn from the consult range.
//!
//! The snapshot is then re-sorted into display order. Entries are never
//! added or removed here, and `completed` entries are never touched.

use std::ops::RangeInclusive;

use crate::config::QueueConfig;
use crate::domain::{EntryId, EntryStatus, QueueSnapshot};

use super::ChanceSource;

/// Tunables for [`advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceSettings {
    /// Per-tick probability that an in-session entry completes.
    pub completion_probability: f64,
    /// Range of simulated consult minutes per patient.
    pub consult_minutes: RangeInclusive<u32>,
}

impl Default for AdvanceSettings {
    fn default() -> Self {
        Self {
            completion_probability: 0.3,
            consult_minutes: 3..=5,
        }
    }
}

impl From<&QueueConfig> for AdvanceSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            completion_probability: config.completion_probability,
            consult_minutes: config.consult_minutes(),
        }
    }
}

/// What a single [`advance`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Entries that moved from `in-session` to `completed`.
    pub completed: Vec<EntryId>,
    /// Entry moved into session by the promotion phase.
    pub promoted: Option<EntryId>,
    /// Per-patient minutes drawn for this advance, if an estimate was made.
    pub per_patient_minutes: Option<u32>,
    /// The current user's wait estimate after the advance.
    pub wait_time_minutes: Option<u32>,
}

/// Advances the simulation by one tick, mutating `snapshot` in place.
pub fn advance(
    snapshot: &mut QueueSnapshot,
    settings: &AdvanceSettings,
    chance: &mut dyn ChanceSource,
) -> AdvanceReport {
    let mut report = AdvanceReport::default();

    for entry in snapshot.entries_mut() {
        if entry.status == EntryStatus::InSession && chance.roll(settings.completion_probability) {
            entry.status = EntryStatus::Completed;
            entry.wait_time_minutes = None;
            tracing::debug!(entry_id = %entry.id, "session completed");
            report.completed.push(entry.id.clone());
        }
    }

    report.promoted = promote_next(snapshot);

    if let Some(position) = snapshot
        .current_user()
        .filter(|user| user.status.awaits_turn())
        .map(|user| user.position)
    {
        let ahead = u32::try_from(snapshot.active_ahead_of(position)).unwrap_or(u32::MAX);
        let per_patient = chance.pick_minutes(settings.consult_minutes.clone());
        let wait = ahead.saturating_mul(per_patient);
        if let Some(user) = snapshot.current_user_mut() {
            // The user's waiting entry is always presented as `your-turn`.
            user.status = EntryStatus::YourTurn;
            user.wait_time_minutes = Some(wait);
        }
        report.per_patient_minutes = Some(per_patient);
        report.wait_time_minutes = Some(wait);
    }

    snapshot.sort_for_display();
    report
}

/// Moves the lowest-position active entry into session when the consulting
/// room is free. Returns the promoted id.
fn promote_next(snapshot: &mut QueueSnapshot) -> Option<EntryId> {
    if snapshot
        .entries()
        .iter()
        .any(|e| e.status == EntryStatus::InSession)
    {
        return None;
    }
    let next = snapshot
        .entries_mut()
        .iter_mut()
        .filter(|e| e.status.awaits_turn())
        .min_by_key(|e| e.position)?;
    next.status = EntryStatus::InSession;
    next.wait_time_minutes = None;
    tracing::debug!(entry_id = %next.id, position = next.position, "entry promoted into session");
    Some(next.id.clone())
}
