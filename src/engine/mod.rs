//! Queue simulation engine.
//!
//! Pure, synchronous building blocks with no hidden global state:
//! randomness comes from a [`ChanceSource`] and time from a [`Clock`],
//! both injected by the caller.
//!
//! ```text
//! Store ──► builder (cold start) ──► updater (per tick) ──► estimator
//! ```

pub mod builder;
pub mod chance;
pub mod clock;
pub mod estimator;
pub mod updater;

pub use builder::{build_for_user, build_initial_snapshot};
pub use chance::{ChanceSource, RandomChance, ScriptedChance};
pub use clock::{Clock, FixedClock, SystemClock, format_clock_time};
pub use estimator::{WaitCountdown, estimate_ready_time, estimate_wait_seconds, format_countdown};
pub use updater::{AdvanceReport, AdvanceSettings, advance};
