//! Background timers driving a [`QueueService`].
//!
//! A [`QueueSession`] owns one task running two intervals: the queue
//! advance (every 30 s by default) and the clock-display refresh (every
//! 60 s). Dropping the session's shutdown sender or calling
//! [`QueueSession::shutdown`] cancels both timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::QueueConfig;
use crate::domain::QueueEvent;
use crate::error::QueueError;
use crate::service::QueueService;

/// Shortest accepted timer period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to the running timer task.
#[derive(Debug)]
pub struct QueueSession {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl QueueSession {
    /// Spawns the timer task. The first advance fires one `advance_every`
    /// after start; the clock display fires immediately.
    #[must_use]
    pub fn spawn(service: Arc<QueueService>, advance_every: Duration, clock_every: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_timers(
            service,
            advance_every.max(MIN_PERIOD),
            clock_every.max(MIN_PERIOD),
            shutdown_rx,
        ));
        Self { handle, shutdown }
    }

    /// Spawns the timer task with intervals from `config`.
    #[must_use]
    pub fn from_config(service: Arc<QueueService>, config: &QueueConfig) -> Self {
        Self::spawn(service, config.advance_interval(), config.clock_interval())
    }

    /// `true` once the timer task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops both timers and waits for the task to exit.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Internal`] if the task panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), QueueError> {
        let _ = self.shutdown.send(true);
        self.handle
            .await
            .map_err(|e| QueueError::Internal(format!("queue session task failed: {e}")))
    }
}

async fn run_timers(
    service: Arc<QueueService>,
    advance_every: Duration,
    clock_every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut advance = time::interval_at(time::Instant::now() + advance_every, advance_every);
    advance.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock = time::interval(clock_every);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        advance_secs = advance_every.as_secs(),
        clock_secs = clock_every.as_secs(),
        "queue session started"
    );

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = clock.tick() => {
                let display_time = service.clock_display();
                tracing::debug!(%display_time, "clock display refreshed");
            }
            _ = advance.tick() => {
                // The store may hit the filesystem; keep it off the async workers.
                let ticking = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || ticking.tick()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(%error, code = error.error_code(), "queue tick failed");
                    }
                    Err(error) => {
                        tracing::warn!(%error, "queue tick task failed");
                    }
                }
            }
        }
    }

    tracing::info!("queue session stopped");
}

/// Writes every event from `event_rx` to the log as JSON until the bus
/// closes.
pub async fn log_events(mut event_rx: broadcast::Receiver<QueueEvent>) {
    loop {
        match event_rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(payload) => {
                    tracing::info!(event_type = event.event_type_str(), %payload, "queue event");
                }
                Err(error) => {
                    tracing::warn!(%error, event_type = event.event_type_str(), "event not serializable");
                }
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event log lagged behind event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("event log closed");
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EntryStatus, EventBus};
    use crate::engine::{Clock, FixedClock, ScriptedChance};
    use crate::store::{JsonFileStore, MemoryStore, RecordStore, keys};
    use chrono::DateTime;

    fn service_on(bus: EventBus, chance: ScriptedChance) -> Arc<QueueService> {
        let Ok(now) = DateTime::parse_from_rfc3339("2026-03-02T10:02:00+00:00") else {
            panic!("valid timestamp");
        };
        Arc::new(QueueService::new(
            Arc::new(MemoryStore::new()) as Arc<dyn RecordStore>,
            Arc::new(FixedClock::new(now)) as Arc<dyn Clock>,
            Box::new(chance),
            bus,
        ))
    }

    fn count(rx: &mut broadcast::Receiver<QueueEvent>, kind: &str) -> usize {
        let mut n = 0;
        while let Ok(event) = rx.try_recv() {
            if event.event_type_str() == kind {
                n += 1;
            }
        }
        n
    }

    #[tokio::test(start_paused = true)]
    async fn timers_fire_on_their_periods() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let service = service_on(bus, ScriptedChance::never());
        let session = QueueSession::spawn(
            Arc::clone(&service),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );

        time::sleep(Duration::from_secs(95)).await;
        tokio_test::assert_ok!(session.shutdown().await);

        assert_eq!(count(&mut rx, "queue_advanced"), 3);
        assert!(matches!(service.snapshot().map(|s| s.len()), Ok(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn clock_display_ticks_immediately_then_each_period() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let service = service_on(bus, ScriptedChance::never());
        let session = QueueSession::spawn(service, Duration::from_secs(30), Duration::from_secs(60));

        time::sleep(Duration::from_secs(61)).await;
        tokio_test::assert_ok!(session.shutdown().await);
        assert_eq!(count(&mut rx, "clock_ticked"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_ticks() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let service = service_on(bus, ScriptedChance::never());
        let session = QueueSession::spawn(
            Arc::clone(&service),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );
        tokio_test::assert_ok!(session.shutdown().await);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count(&mut rx, "queue_advanced"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_persist_progress() {
        let bus = EventBus::new(64);
        let service = service_on(bus, ScriptedChance::always());
        let session = QueueSession::spawn(
            Arc::clone(&service),
            Duration::from_secs(30),
            Duration::from_secs(60),
        );

        time::sleep(Duration::from_secs(31)).await;
        tokio_test::assert_ok!(session.shutdown().await);

        let Ok(snapshot) = service.snapshot() else {
            panic!("snapshot");
        };
        let Some(me) = snapshot.current_user() else {
            panic!("guest entry");
        };
        assert_eq!(me.status, EntryStatus::InSession);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ticks_against_a_file_store_persist() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(store) = JsonFileStore::open(dir.path().join("store.json")) else {
            panic!("open store");
        };
        let store: Arc<dyn RecordStore> = Arc::new(store);
        let Ok(now) = DateTime::parse_from_rfc3339("2026-03-02T10:02:00+00:00") else {
            panic!("valid timestamp");
        };
        let service = Arc::new(QueueService::new(
            Arc::clone(&store),
            Arc::new(FixedClock::new(now)) as Arc<dyn Clock>,
            Box::new(ScriptedChance::never()),
            EventBus::new(16),
        ));
        let session = QueueSession::spawn(
            Arc::clone(&service),
            Duration::from_millis(20),
            Duration::from_secs(60),
        );

        time::sleep(Duration::from_millis(120)).await;
        tokio_test::assert_ok!(session.shutdown().await);
        assert!(matches!(store.get(keys::QUEUE_SNAPSHOT), Ok(Some(_))));
    }

    #[tokio::test]
    async fn event_log_ends_when_bus_closes() {
        let bus = EventBus::new(8);
        let handle = tokio::spawn(log_events(bus.subscribe()));
        let service = service_on(bus, ScriptedChance::never());
        let _ = service.clock_display();
        drop(service);
        assert!(handle.await.is_ok());
    }
}
