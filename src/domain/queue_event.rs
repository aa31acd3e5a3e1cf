//! Domain events reflecting queue state changes.
//!
//! Every mutation performed by the service emits a [`QueueEvent`] through
//! the [`super::EventBus`]. Subscribers (the presentation layer, the demo
//! binary's logger) receive them in publication order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EntryId, QueueProgress};

/// Why a snapshot was (re)built from the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedReason {
    /// No snapshot was stored yet.
    Missing,
    /// A stored snapshot could not be parsed or failed validation.
    Malformed,
}

/// What drove an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceTrigger {
    /// The periodic queue-advance tick.
    Tick,
    /// An explicit user refresh.
    Refresh,
}

/// Domain event emitted after every queue mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A fresh seed snapshot was built and persisted.
    SnapshotSeeded {
        /// Why the seed was needed.
        reason: SeedReason,
        /// Entry count of the seed.
        entries: usize,
        /// Seed timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The updater ran once.
    QueueAdvanced {
        /// Tick or refresh.
        trigger: AdvanceTrigger,
        /// Entries that moved to `completed` during this advance.
        completed: Vec<EntryId>,
        /// Entry promoted to `in-session`, if any.
        promoted: Option<EntryId>,
        /// Current user's wait estimate after the advance.
        wait_time_minutes: Option<u32>,
        /// Progress after the advance.
        progress: QueueProgress,
        /// Advance timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The current user left the queue.
    UserLeft {
        /// Removed entry.
        entry_id: EntryId,
        /// Entries remaining.
        remaining: usize,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The user asked to be notified when their turn approaches.
    NotificationArmed {
        /// Threshold of active entries ahead.
        ahead_threshold: usize,
        /// Request timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An armed notification fired.
    TurnApproaching {
        /// Current user's entry.
        entry_id: EntryId,
        /// Active entries still ahead.
        positions_ahead: usize,
        /// Current wait estimate.
        wait_time_minutes: Option<u32>,
        /// Fire timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The clock-display tick.
    ClockTicked {
        /// Localized wall-clock time, e.g. `10:02 AM`.
        display_time: String,
        /// Tick timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SnapshotSeeded { .. } => "snapshot_seeded",
            Self::QueueAdvanced { .. } => "queue_advanced",
            Self::UserLeft { .. } => "user_left",
            Self::NotificationArmed { .. } => "notification_armed",
            Self::TurnApproaching { .. } => "turn_approaching",
            Self::ClockTicked { .. } => "clock_ticked",
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SnapshotSeeded { timestamp, .. }
            | Self::QueueAdvanced { timestamp, .. }
            | Self::UserLeft { timestamp, .. }
            | Self::NotificationArmed { timestamp, .. }
            | Self::TurnApproaching { timestamp, .. }
            | Self::ClockTicked { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn advanced_event_serializes_with_tag() {
        let event = QueueEvent::QueueAdvanced {
            trigger: AdvanceTrigger::Refresh,
            completed: vec![EntryId::from("seed-2")],
            promoted: None,
            wait_time_minutes: Some(4),
            progress: QueueProgress {
                completed: 2,
                total: 6,
            },
            timestamp: Utc::now(),
        };
        let Ok(json) = serde_json::to_string(&event) else {
            panic!("serialization failed");
        };
        assert!(json.contains("\"event_type\":\"queue_advanced\""));
        assert!(json.contains("\"trigger\":\"refresh\""));
        assert!(json.contains("seed-2"));
    }

    #[test]
    fn event_type_matches_tag() {
        let event = QueueEvent::ClockTicked {
            display_time: "10:02 AM".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "clock_ticked");
    }

    #[test]
    fn timestamp_accessor_returns_field() {
        let now = Utc::now();
        let event = QueueEvent::UserLeft {
            entry_id: EntryId::from("me"),
            remaining: 5,
            timestamp: now,
        };
        assert_eq!(event.timestamp(), now);
    }
}
