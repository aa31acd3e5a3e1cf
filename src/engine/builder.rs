//! Cold-start construction of a queue snapshot.
//!
//! When no usable snapshot is stored, the queue is seeded with a fixed
//! shape: one completed companion, one companion in session, the current
//! user, then three waiting companions, at positions 1 through 6.

use crate::domain::{ClinicVisit, CurrentUser, EntryId, EntryStatus, QueueEntry, QueueSnapshot};

/// Position of the current user in the seed.
pub const SEED_USER_POSITION: u32 = 3;

/// Per-patient minutes assumed by the seed's initial wait estimate.
pub const SEED_CONSULT_MINUTES: u32 = 4;

const SEED_COMPANIONS_BEFORE: [(&str, EntryStatus); 2] = [
    ("Sarah J.", EntryStatus::Completed),
    ("David L.", EntryStatus::InSession),
];

const SEED_COMPANIONS_AFTER: [&str; 3] = ["Emily W.", "Chris B.", "Michael K."];

/// Builds the deterministic seed snapshot for a user.
///
/// Pure: the caller persists the result. The user's entry is flagged as
/// the current user with status `your-turn`, and carries an initial wait of
/// one active entry ahead times [`SEED_CONSULT_MINUTES`].
#[must_use]
pub fn build_initial_snapshot(current_user_id: &EntryId, current_user_name: &str) -> QueueSnapshot {
    let mut entries = Vec::with_capacity(6);
    let mut position = 0_u32;

    for (name, status) in SEED_COMPANIONS_BEFORE {
        position += 1;
        entries.push(QueueEntry::new(
            companion_id(position, current_user_id),
            name,
            position,
            status,
        ));
    }

    position += 1;
    let ahead = SEED_COMPANIONS_BEFORE
        .iter()
        .filter(|(_, status)| !status.is_terminal())
        .count();
    let seed_wait = u32::try_from(ahead)
        .unwrap_or(u32::MAX)
        .saturating_mul(SEED_CONSULT_MINUTES);
    entries.push(
        QueueEntry::new(
            current_user_id.clone(),
            current_user_name,
            position,
            EntryStatus::YourTurn,
        )
        .current_user()
        .with_wait(seed_wait),
    );

    for name in SEED_COMPANIONS_AFTER {
        position += 1;
        entries.push(QueueEntry::new(
            companion_id(position, current_user_id),
            name,
            position,
            EntryStatus::Waiting,
        ));
    }

    let mut snapshot = QueueSnapshot::new(entries);
    snapshot.sort_for_display();
    snapshot
}

/// Builds the seed for a stored user profile, copying descriptive fields
/// (email, booked time) onto the user's entry.
#[must_use]
pub fn build_for_user(user: &CurrentUser, visit: &ClinicVisit) -> QueueSnapshot {
    let mut snapshot = build_initial_snapshot(&user.id, &user.display_name);
    if let Some(entry) = snapshot.current_user_mut() {
        entry.patient_email.clone_from(&user.email);
        entry.appointment_time.clone_from(&visit.appointment_time);
    }
    snapshot
}

/// Deterministic companion id that never collides with the user's id.
fn companion_id(position: u32, current_user_id: &EntryId) -> EntryId {
    let id = EntryId::new(format!("seed-{position}"));
    if &id == current_user_id {
        EntryId::new(format!("seed-{position}-companion"))
    } else {
        id
    }
}
