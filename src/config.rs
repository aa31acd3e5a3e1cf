//! Queue configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to defaults; cross-field constraints are checked by
//! [`QueueConfig::validate`].

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::QueueError;

/// Top-level queue configuration.
///
/// Loaded once at startup via [`QueueConfig::from_env`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Path of the JSON file backing the record store.
    pub store_path: PathBuf,

    /// Seconds between queue-advance ticks.
    pub advance_interval_secs: u64,

    /// Seconds between clock-display ticks.
    pub clock_interval_secs: u64,

    /// Per-tick probability that an in-session entry completes.
    pub completion_probability: f64,

    /// Lower bound (inclusive) of simulated consult minutes per patient.
    pub min_consult_minutes: u32,

    /// Upper bound (inclusive) of simulated consult minutes per patient.
    pub max_consult_minutes: u32,

    /// How long a refresh reports itself as in flight, in milliseconds.
    pub refresh_feedback_ms: u64,

    /// Notify-me fires once at most this many active entries are ahead.
    pub notify_ahead: usize,

    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Current user id to seed into an empty store.
    pub demo_user_id: Option<String>,

    /// Current user display name to seed into an empty store.
    pub demo_user_name: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("clinicflow-store.json"),
            advance_interval_secs: 30,
            clock_interval_secs: 60,
            completion_probability: 0.3,
            min_consult_minutes: 3,
            max_consult_minutes: 5,
            refresh_feedback_ms: 800,
            notify_ahead: 1,
            rng_seed: None,
            event_bus_capacity: 1024,
            demo_user_id: None,
            demo_user_name: "Alex R.".to_string(),
            log_json: false,
        }
    }
}

impl QueueConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfig`] if the resulting values are
    /// inconsistent (see [`QueueConfig::validate`]).
    pub fn from_env() -> Result<Self, QueueError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let store_path = std::env::var("QUEUE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);

        let config = Self {
            store_path,
            advance_interval_secs: parse_env(
                "QUEUE_ADVANCE_INTERVAL_SECS",
                defaults.advance_interval_secs,
            ),
            clock_interval_secs: parse_env("QUEUE_CLOCK_INTERVAL_SECS", defaults.clock_interval_secs),
            completion_probability: parse_env(
                "QUEUE_COMPLETION_PROBABILITY",
                defaults.completion_probability,
            ),
            min_consult_minutes: parse_env("QUEUE_MIN_CONSULT_MINUTES", defaults.min_consult_minutes),
            max_consult_minutes: parse_env("QUEUE_MAX_CONSULT_MINUTES", defaults.max_consult_minutes),
            refresh_feedback_ms: parse_env("QUEUE_REFRESH_FEEDBACK_MS", defaults.refresh_feedback_ms),
            notify_ahead: parse_env("QUEUE_NOTIFY_AHEAD", defaults.notify_ahead),
            rng_seed: std::env::var("QUEUE_RNG_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", defaults.event_bus_capacity),
            demo_user_id: std::env::var("DEMO_USER_ID").ok().filter(|v| !v.is_empty()),
            demo_user_name: std::env::var("DEMO_USER_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.demo_user_name),
            log_json: std::env::var("QUEUE_LOG_FORMAT")
                .map(|v| is_json_format(&v))
                .unwrap_or(defaults.log_json),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfig`] when the completion probability
    /// is outside `[0, 1]`, the consult range is empty, an interval is zero,
    /// or the event bus capacity is zero.
    pub fn validate(&self) -> Result<(), QueueError> {
        if !(0.0..=1.0).contains(&self.completion_probability) {
            return Err(QueueError::InvalidConfig(format!(
                "completion probability {} outside [0, 1]",
                self.completion_probability
            )));
        }
        if self.min_consult_minutes > self.max_consult_minutes {
            return Err(QueueError::InvalidConfig(format!(
                "min consult minutes {} exceeds max {}",
                self.min_consult_minutes, self.max_consult_minutes
            )));
        }
        if self.advance_interval_secs == 0 || self.clock_interval_secs == 0 {
            return Err(QueueError::InvalidConfig(
                "tick intervals must be at least one second".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(QueueError::InvalidConfig(
                "event bus capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Consult-duration range in minutes.
    #[must_use]
    pub fn consult_minutes(&self) -> RangeInclusive<u32> {
        self.min_consult_minutes..=self.max_consult_minutes
    }

    /// Queue-advance tick period.
    #[must_use]
    pub const fn advance_interval(&self) -> Duration {
        Duration::from_secs(self.advance_interval_secs)
    }

    /// Clock-display tick period.
    #[must_use]
    pub const fn clock_interval(&self) -> Duration {
        Duration::from_secs(self.clock_interval_secs)
    }

    /// Window during which a refresh reports itself as in flight.
    #[must_use]
    pub const fn refresh_feedback(&self) -> Duration {
        Duration::from_millis(self.refresh_feedback_ms)
    }
}

/// `true` when a log format setting asks for JSON output.
fn is_json_format(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("json")
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.consult_minutes(), 3..=5);
        assert_eq!(config.advance_interval(), Duration::from_secs(30));
        assert_eq!(config.clock_interval(), Duration::from_secs(60));
        assert_eq!(config.refresh_feedback(), Duration::from_millis(800));
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let config = QueueConfig {
            completion_probability: 1.5,
            ..QueueConfig::default()
        };
        let Err(err) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn inverted_consult_range_rejected() {
        let config = QueueConfig {
            min_consult_minutes: 6,
            max_consult_minutes: 4,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let config = QueueConfig {
            advance_interval_secs: 0,
            ..QueueConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_format_accepts_json_in_any_case() {
        assert!(is_json_format("json"));
        assert!(is_json_format(" JSON "));
        assert!(!is_json_format("pretty"));
        assert!(!QueueConfig::default().log_json);
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u64 = parse_env("CLINICFLOW_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }
}
