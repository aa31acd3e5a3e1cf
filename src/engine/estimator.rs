//! Wait-time estimation for the current user.
//!
//! All functions here are pure: they read a snapshot (and optionally a
//! clock) and never mutate anything.

use std::fmt;

use chrono::TimeDelta;

use crate::domain::{EntryStatus, QueueSnapshot};

use super::Clock;
use super::clock::format_clock_time;

/// Estimated seconds until the current user is seen.
///
/// `None` when the user is not queued or has completed; `Some(0)` while
/// the user is in session.
#[must_use]
pub fn estimate_wait_seconds(snapshot: &QueueSnapshot) -> Option<u64> {
    let user = snapshot.current_user()?;
    match user.status {
        EntryStatus::Completed => None,
        EntryStatus::InSession => Some(0),
        EntryStatus::Waiting | EntryStatus::YourTurn => {
            Some(u64::from(user.wait_time_minutes.unwrap_or(0)) * 60)
        }
    }
}

/// Wall-clock time at which the current user should be seen, formatted
/// like `10:15 AM`. `None` when the user is not queued.
#[must_use]
pub fn estimate_ready_time(snapshot: &QueueSnapshot, clock: &dyn Clock) -> Option<String> {
    let user = snapshot.current_user()?;
    let minutes = if user.status.awaits_turn() {
        user.wait_time_minutes.unwrap_or(0)
    } else {
        0
    };
    let ready = clock.now() + TimeDelta::minutes(i64::from(minutes));
    Some(format_clock_time(&ready))
}

/// Formats seconds as `"{m} mins {s} secs"`.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    format!("{} mins {} secs", seconds / 60, seconds % 60)
}

/// A wait estimate that runs down as time passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitCountdown {
    remaining_secs: u64,
}

impl WaitCountdown {
    /// Starts a countdown from `seconds`.
    #[must_use]
    pub const fn new(seconds: u64) -> Self {
        Self {
            remaining_secs: seconds,
        }
    }

    /// Countdown after `elapsed` has passed, saturating at zero. Negative
    /// elapsed time leaves the countdown unchanged.
    #[must_use]
    pub fn elapse(self, elapsed: TimeDelta) -> Self {
        let secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
        Self {
            remaining_secs: self.remaining_secs.saturating_sub(secs),
        }
    }

    /// Seconds left.
    #[must_use]
    pub const fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    /// `true` once the countdown reaches zero.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.remaining_secs == 0
    }
}

impl fmt::Display for WaitCountdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_countdown(self.remaining_secs))
    }
}
