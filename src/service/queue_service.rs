//! Queue service: orchestrates store reads, engine steps, and events.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use serde::Serialize;

use crate::config::QueueConfig;
use crate::domain::{
    AdvanceTrigger, AppointmentRecord, ClinicVisit, CurrentUser, EntryId, EntryStatus, EventBus,
    QueueEntry, QueueEvent, QueueProgress, QueueSnapshot, SeedReason,
};
use crate::engine::{
    self, AdvanceSettings, ChanceSource, Clock, WaitCountdown, build_for_user, format_clock_time,
};
use crate::error::QueueError;
use crate::store::{Lookup, RecordStore, keys, read_record, write_record};

/// Id used for the current user when no usable `currentUser` record exists.
pub const GUEST_USER_ID: &str = "guest";

/// Display name used for the guest user.
pub const GUEST_USER_NAME: &str = "You";

/// Message shown when the user has no queue entry.
pub const NOT_IN_QUEUE_MESSAGE: &str = "You are not currently in a queue.";

/// Message shown once the user's consultation has finished.
pub const COMPLETED_MESSAGE: &str = "Your consultation is complete.";

/// Orchestration layer for the live queue.
///
/// Owns the injected store, clock, and chance source. Every operation
/// takes the internal lock for its whole duration, so ticks, refreshes,
/// and user actions never interleave within one process. Across processes
/// sharing a store the last write wins.
///
/// Operations follow the pattern: lock → load snapshot (seeding on
/// missing or malformed data) → mutate → persist → emit events.
#[derive(Debug)]
pub struct QueueService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    settings: AdvanceSettings,
    refresh_feedback: TimeDelta,
    notify_ahead: usize,
    state: Mutex<ServiceState>,
}

#[derive(Debug)]
struct ServiceState {
    chance: Box<dyn ChanceSource>,
    refreshed_at: Option<DateTime<FixedOffset>>,
    estimated_at: Option<DateTime<FixedOffset>>,
    notify_armed: bool,
}

/// Result of [`QueueService::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    /// Snapshot after the advance.
    pub snapshot: QueueSnapshot,
    /// `true` while the refresh feedback window is open; drives a disabled
    /// refresh control.
    pub in_flight: bool,
}

/// Result of [`QueueService::leave_queue`].
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// The user's entry was removed and the snapshot rewritten.
    Left {
        /// Removed entry.
        entry: QueueEntry,
        /// Entries left in the queue.
        remaining: usize,
    },
    /// The user had no entry; nothing changed.
    NotInQueue,
}

impl LeaveOutcome {
    /// `true` when the caller should navigate away from the queue view.
    #[must_use]
    pub const fn should_navigate_away(&self) -> bool {
        matches!(self, Self::Left { .. })
    }
}

/// Result of [`QueueService::request_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Armed; fires on a later advance.
    Armed,
    /// The user was already close enough; fired immediately.
    Fired,
    /// The user has no active entry.
    NotInQueue,
}

/// The current user's place in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStanding {
    /// The user's entry id.
    pub entry_id: EntryId,
    /// The user's entry status.
    pub status: EntryStatus,
    /// Active entries ranked ahead.
    pub positions_ahead: usize,
    /// Remaining wait, run down since the last estimate.
    #[serde(serialize_with = "serialize_countdown")]
    pub countdown: WaitCountdown,
    /// Estimated consultation time, e.g. `10:15 AM`.
    pub ready_time: Option<String>,
    /// Whether notify-me is armed.
    pub notification_armed: bool,
}

/// Everything the queue view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    /// The snapshot in display order.
    pub snapshot: QueueSnapshot,
    /// Completed-versus-total counts.
    pub progress: QueueProgress,
    /// Doctor and clinic details.
    pub visit: ClinicVisit,
    /// The user's standing, `None` when not queued.
    pub standing: Option<UserStanding>,
    /// Whether a refresh is still in flight.
    pub refreshing: bool,
}

impl QueueStatus {
    /// Informational message for users without an active entry.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        match &self.standing {
            None => Some(NOT_IN_QUEUE_MESSAGE),
            Some(standing) if standing.status.is_terminal() => Some(COMPLETED_MESSAGE),
            Some(_) => None,
        }
    }

    /// `true` when the user holds an active entry.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.message().is_none()
    }
}

fn serialize_countdown<S: serde::Serializer>(
    countdown: &WaitCountdown,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(countdown.remaining_secs())
}

impl QueueService {
    /// Creates a service with default advance settings, an 800 ms refresh
    /// window, and notify-me at one entry ahead.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        chance: Box<dyn ChanceSource>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            clock,
            event_bus,
            settings: AdvanceSettings::default(),
            refresh_feedback: TimeDelta::milliseconds(800),
            notify_ahead: 1,
            state: Mutex::new(ServiceState {
                chance,
                refreshed_at: None,
                estimated_at: None,
                notify_armed: false,
            }),
        }
    }

    /// Creates a service tuned by `config`.
    #[must_use]
    pub fn from_config(
        config: &QueueConfig,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        chance: Box<dyn ChanceSource>,
        event_bus: EventBus,
    ) -> Self {
        Self::new(store, clock, chance, event_bus)
            .with_settings(AdvanceSettings::from(config))
            .with_refresh_feedback(config.refresh_feedback())
            .with_notify_ahead(config.notify_ahead)
    }

    /// Replaces the advance settings.
    #[must_use]
    pub fn with_settings(mut self, settings: AdvanceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets how long a refresh reports itself as in flight.
    #[must_use]
    pub fn with_refresh_feedback(mut self, window: Duration) -> Self {
        self.refresh_feedback = TimeDelta::from_std(window).unwrap_or(TimeDelta::zero());
        self
    }

    /// Sets the notify-me threshold of active entries ahead.
    #[must_use]
    pub fn with_notify_ahead(mut self, ahead: usize) -> Self {
        self.notify_ahead = ahead;
        self
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the backing record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Reads the signed-in user, falling back to a guest profile when the
    /// record is missing or malformed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read.
    pub fn current_user(&self) -> Result<CurrentUser, QueueError> {
        match read_record::<CurrentUser>(self.store.as_ref(), keys::CURRENT_USER)? {
            Lookup::Found(user) => Ok(user),
            Lookup::Malformed(error) => {
                tracing::warn!(%error, "current user record malformed, using guest");
                Ok(guest_user())
            }
            Lookup::Missing => {
                tracing::debug!("no current user record, using guest");
                Ok(guest_user())
            }
        }
    }

    /// Stores `fallback` as the current user unless a usable record exists.
    /// Returns the effective user.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn ensure_current_user(&self, fallback: CurrentUser) -> Result<CurrentUser, QueueError> {
        if let Lookup::Found(user) =
            read_record::<CurrentUser>(self.store.as_ref(), keys::CURRENT_USER)?
        {
            return Ok(user);
        }
        write_record(self.store.as_ref(), keys::CURRENT_USER, &fallback)?;
        tracing::info!(user_id = %fallback.id, name = %fallback.display_name, "current user stored");
        Ok(fallback)
    }

    /// Doctor and clinic details for `user`: the `currentAppointment`
    /// record if usable, else the user's most recent entry in
    /// `appointments`, else defaults.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read.
    pub fn visit_for(&self, user: &CurrentUser) -> Result<ClinicVisit, QueueError> {
        match read_record::<AppointmentRecord>(self.store.as_ref(), keys::CURRENT_APPOINTMENT)? {
            Lookup::Found(appointment) => return Ok(ClinicVisit::from_appointment(Some(&appointment))),
            Lookup::Malformed(error) => {
                tracing::warn!(%error, "current appointment malformed, ignoring");
            }
            Lookup::Missing => {}
        }
        match read_record::<Vec<serde_json::Value>>(self.store.as_ref(), keys::APPOINTMENTS)? {
            Lookup::Found(raw) => {
                let list = decode_appointments(raw);
                Ok(ClinicVisit::from_appointment(
                    AppointmentRecord::most_recent_for(&list, &user.id),
                ))
            }
            Lookup::Malformed(error) => {
                tracing::warn!(%error, "appointment list malformed, using default visit");
                Ok(ClinicVisit::default())
            }
            Lookup::Missing => Ok(ClinicVisit::default()),
        }
    }

    /// Returns the stored snapshot, seeding and persisting a fresh one when
    /// it is missing or malformed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        let mut state = self.lock()?;
        self.load_or_seed(&mut state)
    }

    /// Runs one periodic advance and persists the result.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn tick(&self) -> Result<QueueSnapshot, QueueError> {
        self.advance_with(AdvanceTrigger::Tick)
    }

    /// Runs one advance immediately, independent of the tick timer.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn refresh(&self) -> Result<RefreshOutcome, QueueError> {
        let snapshot = self.advance_with(AdvanceTrigger::Refresh)?;
        let in_flight = self.is_refreshing()?;
        Ok(RefreshOutcome {
            snapshot,
            in_flight,
        })
    }

    /// `true` while the feedback window of the last refresh is open.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Internal`] if the service lock is poisoned.
    pub fn is_refreshing(&self) -> Result<bool, QueueError> {
        let state = self.lock()?;
        Ok(self.refreshing(&state))
    }

    /// Removes the current user's entry if it belongs to `user_id`.
    ///
    /// Idempotent: with no matching entry (or no stored queue at all) the
    /// store is left untouched and [`LeaveOutcome::NotInQueue`] is returned.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn leave_queue(&self, user_id: &EntryId) -> Result<LeaveOutcome, QueueError> {
        let mut state = self.lock()?;
        let Some(mut snapshot) =
            read_record::<QueueSnapshot>(self.store.as_ref(), keys::QUEUE_SNAPSHOT)?.found()
        else {
            tracing::debug!(%user_id, "leave requested with no stored queue");
            return Ok(LeaveOutcome::NotInQueue);
        };
        if snapshot.current_user().map(|e| &e.id) != Some(user_id) {
            tracing::debug!(%user_id, "leave requested but user not queued");
            return Ok(LeaveOutcome::NotInQueue);
        }
        let Some(entry) = snapshot.remove_current_user() else {
            return Ok(LeaveOutcome::NotInQueue);
        };
        write_record(self.store.as_ref(), keys::QUEUE_SNAPSHOT, &snapshot)?;
        state.notify_armed = false;

        let remaining = snapshot.len();
        tracing::info!(%user_id, remaining, "user left the queue");
        let _ = self.event_bus.publish(QueueEvent::UserLeft {
            entry_id: entry.id.clone(),
            remaining,
            timestamp: self.now_utc(),
        });
        Ok(LeaveOutcome::Left { entry, remaining })
    }

    /// Estimated consultation time of the current user, e.g. `10:15 AM`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn estimate_ready_time(&self) -> Result<Option<String>, QueueError> {
        let mut state = self.lock()?;
        let snapshot = self.load_or_seed(&mut state)?;
        Ok(engine::estimate_ready_time(&snapshot, self.clock.as_ref()))
    }

    /// Everything the queue view needs in one read.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn status(&self) -> Result<QueueStatus, QueueError> {
        let mut state = self.lock()?;
        let snapshot = self.load_or_seed(&mut state)?;
        let user = self.current_user()?;
        let visit = self.visit_for(&user)?;
        let now = self.clock.now();

        let standing = snapshot.current_user().map(|entry| {
            let elapsed = state.estimated_at.map_or(TimeDelta::zero(), |at| now - at);
            let wait_secs = engine::estimate_wait_seconds(&snapshot).unwrap_or(0);
            UserStanding {
                entry_id: entry.id.clone(),
                status: entry.status,
                positions_ahead: snapshot.active_ahead_of(entry.position),
                countdown: WaitCountdown::new(wait_secs).elapse(elapsed),
                ready_time: engine::estimate_ready_time(&snapshot, self.clock.as_ref()),
                notification_armed: state.notify_armed,
            }
        });

        Ok(QueueStatus {
            progress: snapshot.progress(),
            refreshing: self.refreshing(&state),
            visit,
            standing,
            snapshot,
        })
    }

    /// Arms a one-shot notification for when the user's turn approaches.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend cannot be read or written.
    pub fn request_notification(&self) -> Result<NotifyOutcome, QueueError> {
        let mut state = self.lock()?;
        let snapshot = self.load_or_seed(&mut state)?;
        if snapshot.current_user().filter(|e| e.is_active()).is_none() {
            return Ok(NotifyOutcome::NotInQueue);
        }
        state.notify_armed = true;
        let _ = self.event_bus.publish(QueueEvent::NotificationArmed {
            ahead_threshold: self.notify_ahead,
            timestamp: self.now_utc(),
        });
        if self.check_notification(&mut state, &snapshot) {
            Ok(NotifyOutcome::Fired)
        } else {
            Ok(NotifyOutcome::Armed)
        }
    }

    /// Formats the current time for the "Updated:" label and broadcasts it.
    pub fn clock_display(&self) -> String {
        let display_time = format_clock_time(&self.clock.now());
        let _ = self.event_bus.publish(QueueEvent::ClockTicked {
            display_time: display_time.clone(),
            timestamp: self.now_utc(),
        });
        display_time
    }

    fn advance_with(&self, trigger: AdvanceTrigger) -> Result<QueueSnapshot, QueueError> {
        let mut state = self.lock()?;
        let mut snapshot = self.load_or_seed(&mut state)?;

        let report = engine::advance(&mut snapshot, &self.settings, state.chance.as_mut());
        write_record(self.store.as_ref(), keys::QUEUE_SNAPSHOT, &snapshot)?;

        let now = self.clock.now();
        state.estimated_at = Some(now);
        if trigger == AdvanceTrigger::Refresh {
            state.refreshed_at = Some(now);
        }

        let progress = snapshot.progress();
        tracing::info!(
            ?trigger,
            completed = report.completed.len(),
            promoted = ?report.promoted,
            wait_time_minutes = ?report.wait_time_minutes,
            progress = %format_args!("{}/{}", progress.completed, progress.total),
            "queue advanced"
        );
        let _ = self.event_bus.publish(QueueEvent::QueueAdvanced {
            trigger,
            completed: report.completed,
            promoted: report.promoted,
            wait_time_minutes: report.wait_time_minutes,
            progress,
            timestamp: now.with_timezone(&Utc),
        });

        self.check_notification(&mut state, &snapshot);
        Ok(snapshot)
    }

    fn load_or_seed(&self, state: &mut ServiceState) -> Result<QueueSnapshot, QueueError> {
        let reason = match read_record::<QueueSnapshot>(self.store.as_ref(), keys::QUEUE_SNAPSHOT)? {
            Lookup::Found(snapshot) => match snapshot.validate() {
                Ok(()) => return Ok(snapshot),
                Err(error) => {
                    tracing::warn!(%error, "stored queue snapshot invalid, reseeding");
                    SeedReason::Malformed
                }
            },
            Lookup::Malformed(error) => {
                tracing::warn!(%error, "stored queue snapshot unreadable, reseeding");
                SeedReason::Malformed
            }
            Lookup::Missing => SeedReason::Missing,
        };

        let user = self.current_user()?;
        let visit = self.visit_for(&user)?;
        let snapshot = build_for_user(&user, &visit);
        write_record(self.store.as_ref(), keys::QUEUE_SNAPSHOT, &snapshot)?;
        state.estimated_at = Some(self.clock.now());

        tracing::info!(?reason, user_id = %user.id, entries = snapshot.len(), "queue snapshot seeded");
        let _ = self.event_bus.publish(QueueEvent::SnapshotSeeded {
            reason,
            entries: snapshot.len(),
            timestamp: self.now_utc(),
        });
        Ok(snapshot)
    }

    /// Fires the armed notification if the user is close enough. Returns
    /// `true` when it fired.
    fn check_notification(&self, state: &mut ServiceState, snapshot: &QueueSnapshot) -> bool {
        if !state.notify_armed {
            return false;
        }
        let Some(user) = snapshot.current_user().filter(|e| e.is_active()) else {
            return false;
        };
        let positions_ahead = snapshot.active_ahead_of(user.position);
        if positions_ahead > self.notify_ahead {
            return false;
        }
        state.notify_armed = false;
        tracing::info!(entry_id = %user.id, positions_ahead, "turn approaching, notifying user");
        let _ = self.event_bus.publish(QueueEvent::TurnApproaching {
            entry_id: user.id.clone(),
            positions_ahead,
            wait_time_minutes: user.wait_time_minutes,
            timestamp: self.now_utc(),
        });
        true
    }

    fn refreshing(&self, state: &ServiceState) -> bool {
        state
            .refreshed_at
            .is_some_and(|at| self.clock.now() < at + self.refresh_feedback)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ServiceState>, QueueError> {
        self.state
            .lock()
            .map_err(|_| QueueError::Internal("queue service lock poisoned".to_string()))
    }
}

/// Decodes each booking on its own so one unreadable record does not hide
/// the rest.
fn decode_appointments(raw: Vec<serde_json::Value>) -> Vec<AppointmentRecord> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable appointment");
                None
            }
        })
        .collect()
}

fn guest_user() -> CurrentUser {
    CurrentUser::new(EntryId::from(GUEST_USER_ID), GUEST_USER_NAME)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::engine::{FixedClock, ScriptedChance};
    use crate::store::MemoryStore;
    use tokio::sync::broadcast;

    struct Harness {
        service: QueueService,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        events: broadcast::Receiver<QueueEvent>,
    }

    fn ten_oh_two() -> DateTime<FixedOffset> {
        let Ok(time) = DateTime::parse_from_rfc3339("2026-03-02T10:02:00+00:00") else {
            panic!("valid timestamp");
        };
        time
    }

    fn harness(chance: ScriptedChance) -> Harness {
        harness_notifying_at(chance, 1)
    }

    fn harness_notifying_at(chance: ScriptedChance, notify_ahead: usize) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(ten_oh_two()));
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let service = QueueService::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Box::new(chance),
            bus,
        )
        .with_notify_ahead(notify_ahead);
        Harness {
            service,
            store,
            clock,
            events,
        }
    }

    fn with_user(h: &Harness, id: &str) {
        let user = CurrentUser::new(EntryId::from(id), "Alex R.");
        if write_record(h.store.as_ref(), keys::CURRENT_USER, &user).is_err() {
            panic!("store user");
        }
    }

    fn drain(rx: &mut broadcast::Receiver<QueueEvent>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.event_type_str());
        }
        kinds
    }

    fn stored_snapshot(h: &Harness) -> QueueSnapshot {
        let Ok(Lookup::Found(snapshot)) =
            read_record::<QueueSnapshot>(h.store.as_ref(), keys::QUEUE_SNAPSHOT)
        else {
            panic!("expected stored snapshot");
        };
        snapshot
    }

    #[test]
    fn first_read_seeds_and_persists() {
        let mut h = harness(ScriptedChance::never());
        with_user(&h, "u1");

        let Ok(snapshot) = h.service.snapshot() else {
            panic!("snapshot");
        };
        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot.current_user().map(|e| e.id.as_str()), Some("u1"));
        assert_eq!(stored_snapshot(&h), snapshot);
        assert_eq!(drain(&mut h.events), vec!["snapshot_seeded"]);

        let Ok(again) = h.service.snapshot() else {
            panic!("snapshot");
        };
        assert_eq!(again, snapshot);
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn malformed_snapshot_fails_open_to_seed() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        assert!(h.store.set(keys::QUEUE_SNAPSHOT, "{\"broken\":".to_string()).is_ok());

        let Ok(snapshot) = h.service.snapshot() else {
            panic!("malformed data must not surface as an error");
        };
        assert_eq!(snapshot.len(), 6);
    }

    #[test]
    fn invalid_snapshot_is_reseeded() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let bad = QueueSnapshot::new(vec![
            QueueEntry::new(EntryId::from("a"), "A", 1, EntryStatus::Waiting).current_user(),
            QueueEntry::new(EntryId::from("b"), "B", 2, EntryStatus::Waiting).current_user(),
        ]);
        assert!(write_record(h.store.as_ref(), keys::QUEUE_SNAPSHOT, &bad).is_ok());

        let Ok(snapshot) = h.service.snapshot() else {
            panic!("snapshot");
        };
        assert_eq!(snapshot.current_user_count(), 1);
        assert_eq!(snapshot.len(), 6);
    }

    #[test]
    fn missing_user_falls_back_to_guest() {
        let h = harness(ScriptedChance::never());
        let Ok(snapshot) = h.service.snapshot() else {
            panic!("snapshot");
        };
        let Some(me) = snapshot.current_user() else {
            panic!("guest entry expected");
        };
        assert_eq!(me.id.as_str(), GUEST_USER_ID);
        assert_eq!(me.name, GUEST_USER_NAME);
    }

    #[test]
    fn tick_scenario_keeps_session_and_estimates_one_patient() {
        let mut h = harness(ScriptedChance::never().with_minutes([4]));
        with_user(&h, "u1");

        let Ok(snapshot) = h.service.tick() else {
            panic!("tick");
        };
        let Some(me) = snapshot.current_user() else {
            panic!("user entry");
        };
        assert_eq!(me.status, EntryStatus::YourTurn);
        assert_eq!(me.wait_time_minutes, Some(4));
        assert_eq!(stored_snapshot(&h), snapshot);
        assert_eq!(drain(&mut h.events), vec!["snapshot_seeded", "queue_advanced"]);

        let Ok(ready) = h.service.estimate_ready_time() else {
            panic!("estimate");
        };
        assert_eq!(ready.as_deref(), Some("10:06 AM"));
    }

    #[test]
    fn unknown_entry_fields_survive_ticks() {
        let h = harness(ScriptedChance::never());
        let raw = r#"[
            {"id":"a","name":"A","position":1,"status":"in-session","icon":"doc"},
            {"id":"me","name":"Me","position":2,"status":"your-turn","isCurrentUser":true}
        ]"#;
        assert!(h.store.set(keys::QUEUE_SNAPSHOT, raw.to_string()).is_ok());
        assert!(h.service.tick().is_ok());

        let Ok(Some(stored)) = h.store.get(keys::QUEUE_SNAPSHOT) else {
            panic!("stored snapshot");
        };
        assert!(stored.contains("\"icon\":\"doc\""));
    }

    #[test]
    fn refresh_reports_in_flight_until_window_closes() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");

        let Ok(outcome) = h.service.refresh() else {
            panic!("refresh");
        };
        assert!(outcome.in_flight);
        assert_eq!(outcome.snapshot.len(), 6);

        h.clock.advance(TimeDelta::milliseconds(900));
        assert!(matches!(h.service.is_refreshing(), Ok(false)));
    }

    #[test]
    fn ticks_do_not_open_the_refresh_window() {
        let h = harness(ScriptedChance::never());
        assert!(h.service.tick().is_ok());
        assert!(matches!(h.service.is_refreshing(), Ok(false)));
    }

    #[test]
    fn leave_removes_exactly_one_entry_then_is_a_no_op() {
        let mut h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        assert!(h.service.snapshot().is_ok());
        let _ = drain(&mut h.events);

        let Ok(outcome) = h.service.leave_queue(&EntryId::from("u1")) else {
            panic!("leave");
        };
        assert!(outcome.should_navigate_away());
        let after_first = stored_snapshot(&h);
        assert_eq!(after_first.len(), 5);
        assert_eq!(after_first.current_user_count(), 0);
        assert_eq!(drain(&mut h.events), vec!["user_left"]);

        let Ok(second) = h.service.leave_queue(&EntryId::from("u1")) else {
            panic!("second leave");
        };
        assert_eq!(second, LeaveOutcome::NotInQueue);
        assert_eq!(stored_snapshot(&h), after_first);
        assert!(drain(&mut h.events).is_empty());
    }

    #[test]
    fn leave_without_stored_queue_writes_nothing() {
        let h = harness(ScriptedChance::never());
        let Ok(outcome) = h.service.leave_queue(&EntryId::from("u1")) else {
            panic!("leave");
        };
        assert_eq!(outcome, LeaveOutcome::NotInQueue);
        assert!(matches!(h.store.get(keys::QUEUE_SNAPSHOT), Ok(None)));
    }

    #[test]
    fn leave_for_another_user_is_ignored() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        assert!(h.service.snapshot().is_ok());
        let Ok(outcome) = h.service.leave_queue(&EntryId::from("someone-else")) else {
            panic!("leave");
        };
        assert_eq!(outcome, LeaveOutcome::NotInQueue);
        assert_eq!(stored_snapshot(&h).len(), 6);
    }

    #[test]
    fn status_after_leaving_reports_not_in_queue() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        assert!(h.service.snapshot().is_ok());
        assert!(h.service.leave_queue(&EntryId::from("u1")).is_ok());

        let Ok(status) = h.service.status() else {
            panic!("status");
        };
        assert!(!status.is_queued());
        assert_eq!(status.message(), Some(NOT_IN_QUEUE_MESSAGE));
        assert_eq!(status.progress.total, 5);
    }

    #[test]
    fn status_countdown_runs_down_with_the_clock() {
        let h = harness(ScriptedChance::never().with_minutes([5]));
        with_user(&h, "u1");
        assert!(h.service.tick().is_ok());

        h.clock.advance(TimeDelta::seconds(90));
        let Ok(status) = h.service.status() else {
            panic!("status");
        };
        let Some(standing) = status.standing else {
            panic!("standing");
        };
        assert_eq!(standing.positions_ahead, 1);
        assert_eq!(standing.countdown.remaining_secs(), 210);
        assert_eq!(standing.countdown.to_string(), "3 mins 30 secs");
        assert_eq!(status.visit.summary(), "Dr. Smith's Clinic • Room 205");
    }

    #[test]
    fn completed_user_gets_completion_message() {
        let h = harness(ScriptedChance::always());
        with_user(&h, "u1");
        assert!(h.service.tick().is_ok());
        assert!(h.service.tick().is_ok());

        let Ok(status) = h.service.status() else {
            panic!("status");
        };
        assert_eq!(status.message(), Some(COMPLETED_MESSAGE));
        assert!(matches!(
            h.service.request_notification(),
            Ok(NotifyOutcome::NotInQueue)
        ));
    }

    #[test]
    fn visit_prefers_current_appointment() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let appointment = AppointmentRecord {
            doctor_name: Some("Dr. Okafor".to_string()),
            room: Some("Room 3".to_string()),
            requested_time: Some("11:30 AM".to_string()),
            ..AppointmentRecord::default()
        };
        assert!(write_record(h.store.as_ref(), keys::CURRENT_APPOINTMENT, &appointment).is_ok());

        let Ok(status) = h.service.status() else {
            panic!("status");
        };
        assert_eq!(status.visit.summary(), "Dr. Okafor's Clinic • Room 3");
        let Some(me) = status.snapshot.current_user() else {
            panic!("user entry");
        };
        assert_eq!(me.appointment_time.as_deref(), Some("11:30 AM"));
    }

    #[test]
    fn visit_falls_back_to_appointment_list() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let list = vec![
            AppointmentRecord {
                patient_id: Some(EntryId::from("u1")),
                clinic_name: Some("Northside Clinic".to_string()),
                ..AppointmentRecord::default()
            },
            AppointmentRecord {
                patient_id: Some(EntryId::from("u2")),
                clinic_name: Some("Elsewhere".to_string()),
                ..AppointmentRecord::default()
            },
        ];
        assert!(write_record(h.store.as_ref(), keys::APPOINTMENTS, &list).is_ok());

        let Ok(user) = h.service.current_user() else {
            panic!("user");
        };
        let Ok(visit) = h.service.visit_for(&user) else {
            panic!("visit");
        };
        assert_eq!(visit.clinic_name, "Northside Clinic");
    }

    #[test]
    fn foreign_booking_with_unknown_status_keeps_own_visit() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let raw = r#"[
            {"patientId":"u1","clinicName":"Northside Clinic","status":"pending"},
            {"patientId":"u2","status":"cancelled"}
        ]"#;
        assert!(h.store.set(keys::APPOINTMENTS, raw.to_string()).is_ok());

        let Ok(user) = h.service.current_user() else {
            panic!("user");
        };
        let Ok(visit) = h.service.visit_for(&user) else {
            panic!("visit");
        };
        assert_eq!(visit.clinic_name, "Northside Clinic");
    }

    #[test]
    fn unreadable_booking_is_skipped_not_fatal() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let raw = r#"[
            {"patientId":"u2","createdAt":"not a timestamp"},
            {"patientId":"u1","room":"Room 9"}
        ]"#;
        assert!(h.store.set(keys::APPOINTMENTS, raw.to_string()).is_ok());

        let Ok(visit) = h.service.visit_for(&CurrentUser::new(EntryId::from("u1"), "Alex R.")) else {
            panic!("visit");
        };
        assert_eq!(visit.room, "Room 9");
    }

    #[test]
    fn malformed_appointment_uses_default_visit() {
        let h = harness(ScriptedChance::never());
        assert!(h.store.set(keys::CURRENT_APPOINTMENT, "42".to_string()).is_ok());
        let Ok(visit) = h.service.visit_for(&guest_user()) else {
            panic!("visit");
        };
        assert_eq!(visit, ClinicVisit::default());
    }

    #[test]
    fn notification_fires_immediately_when_already_close() {
        let mut h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        assert!(h.service.snapshot().is_ok());
        let _ = drain(&mut h.events);

        assert!(matches!(
            h.service.request_notification(),
            Ok(NotifyOutcome::Fired)
        ));
        assert_eq!(
            drain(&mut h.events),
            vec!["notification_armed", "turn_approaching"]
        );
    }

    #[test]
    fn armed_notification_fires_once_on_a_later_tick() {
        let mut h = harness_notifying_at(ScriptedChance::never().with_rolls([false, true]), 0);
        with_user(&h, "u1");

        assert!(matches!(
            h.service.request_notification(),
            Ok(NotifyOutcome::Armed)
        ));
        let _ = drain(&mut h.events);

        assert!(h.service.tick().is_ok());
        assert!(!drain(&mut h.events).contains(&"turn_approaching"));

        assert!(h.service.tick().is_ok());
        let kinds = drain(&mut h.events);
        assert_eq!(
            kinds.iter().filter(|k| **k == "turn_approaching").count(),
            1
        );

        assert!(h.service.tick().is_ok());
        assert!(!drain(&mut h.events).contains(&"turn_approaching"));
    }

    #[test]
    fn clock_display_broadcasts_formatted_time() {
        let mut h = harness(ScriptedChance::never());
        assert_eq!(h.service.clock_display(), "10:02 AM");
        assert_eq!(drain(&mut h.events), vec!["clock_ticked"]);
    }

    #[test]
    fn ensure_current_user_keeps_existing_record() {
        let h = harness(ScriptedChance::never());
        with_user(&h, "u1");
        let Ok(user) = h.service.ensure_current_user(CurrentUser::guest("Someone")) else {
            panic!("ensure");
        };
        assert_eq!(user.id.as_str(), "u1");
    }

    #[test]
    fn ensure_current_user_stores_fallback() {
        let h = harness(ScriptedChance::never());
        let fallback = CurrentUser::new(EntryId::from("demo"), "Demo");
        assert!(h.service.ensure_current_user(fallback.clone()).is_ok());
        let Ok(user) = h.service.current_user() else {
            panic!("user");
        };
        assert_eq!(user, fallback);
    }
}
