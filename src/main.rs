//! clinicflow-queue entry point.
//!
//! Runs the live queue against a JSON-file store until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use clinicflow_queue::config::QueueConfig;
use clinicflow_queue::domain::{CurrentUser, EntryId, EventBus};
use clinicflow_queue::engine::{ChanceSource, Clock, RandomChance, SystemClock};
use clinicflow_queue::service::QueueService;
use clinicflow_queue::session::{QueueSession, log_events};
use clinicflow_queue::store::{JsonFileStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = QueueConfig::from_env().context("loading queue configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(store = %config.store_path.display(), "starting clinicflow-queue");

    // Build storage and sources
    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("opening store at {}", config.store_path.display()))?;
    let store: Arc<dyn RecordStore> = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let chance: Box<dyn ChanceSource> = match config.rng_seed {
        Some(seed) => Box::new(RandomChance::seeded(seed)),
        None => Box::new(RandomChance::from_entropy()),
    };
    let event_bus = EventBus::new(config.event_bus_capacity);
    let event_log = tokio::spawn(log_events(event_bus.subscribe()));

    // Build service layer
    let service = Arc::new(QueueService::from_config(
        &config, store, clock, chance, event_bus,
    ));
    let demo_user = match &config.demo_user_id {
        Some(id) => CurrentUser::new(EntryId::from(id.as_str()), config.demo_user_name.as_str()),
        None => CurrentUser::guest(config.demo_user_name.as_str()),
    };
    let user = service
        .ensure_current_user(demo_user)
        .context("storing current user")?;

    let status = service.status().context("loading queue")?;
    tracing::info!(
        user_id = %user.id,
        clinic = %status.visit.summary(),
        positions_ahead = ?status.standing.as_ref().map(|s| s.positions_ahead),
        "queue ready"
    );

    // Run timers until interrupted
    let session = QueueSession::from_config(Arc::clone(&service), &config);
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");

    session.shutdown().await.context("stopping queue session")?;
    drop(service);
    event_log.await.context("joining event log")?;

    Ok(())
}
