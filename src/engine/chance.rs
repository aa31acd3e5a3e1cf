//! Injectable randomness for the simulation.
//!
//! The updater never touches a global RNG. It asks a [`ChanceSource`] two
//! questions: "does this session finish this tick?" and "how many minutes
//! does one consult take right now?". Production code plugs in
//! [`RandomChance`]; tests plug in [`ScriptedChance`] to force outcomes.

use std::collections::VecDeque;
use std::fmt;
use std::ops::RangeInclusive;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of the updater's random decisions.
pub trait ChanceSource: fmt::Debug + Send {
    /// Returns `true` with probability `probability` (clamped to `[0, 1]`).
    fn roll(&mut self, probability: f64) -> bool;

    /// Picks a value uniformly from `range`. An empty range yields its start.
    fn pick_minutes(&mut self, range: RangeInclusive<u32>) -> u32;
}

/// [`ChanceSource`] backed by a `SmallRng`.
#[derive(Debug, Clone)]
pub struct RandomChance(SmallRng);

impl RandomChance {
    /// Seeds from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self(SmallRng::from_entropy())
    }

    /// Seeds deterministically, for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl ChanceSource for RandomChance {
    fn roll(&mut self, probability: f64) -> bool {
        self.0.gen_bool(clamp_probability(probability))
    }

    fn pick_minutes(&mut self, range: RangeInclusive<u32>) -> u32 {
        if range.is_empty() {
            return *range.start();
        }
        self.0.gen_range(range)
    }
}

/// [`ChanceSource`] that replays scripted answers.
///
/// Rolls come from the roll script, then from `default_roll` once the
/// script runs out. Minutes come from the minutes script clamped into the
/// requested range, then from the range start.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChance {
    rolls: VecDeque<bool>,
    minutes: VecDeque<u32>,
    default_roll: bool,
}

impl ScriptedChance {
    /// A source whose every roll fails and every pick is the range start.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// A source whose every roll succeeds.
    #[must_use]
    pub fn always() -> Self {
        Self {
            default_roll: true,
            ..Self::default()
        }
    }

    /// Queues roll outcomes.
    #[must_use]
    pub fn with_rolls(mut self, rolls: impl IntoIterator<Item = bool>) -> Self {
        self.rolls.extend(rolls);
        self
    }

    /// Queues minute picks.
    #[must_use]
    pub fn with_minutes(mut self, minutes: impl IntoIterator<Item = u32>) -> Self {
        self.minutes.extend(minutes);
        self
    }
}

impl ChanceSource for ScriptedChance {
    fn roll(&mut self, _probability: f64) -> bool {
        self.rolls.pop_front().unwrap_or(self.default_roll)
    }

    fn pick_minutes(&mut self, range: RangeInclusive<u32>) -> u32 {
        let (lo, hi) = (*range.start(), *range.end());
        match self.minutes.pop_front() {
            Some(m) if lo <= hi => m.clamp(lo, hi),
            _ => lo,
        }
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sources_agree() {
        let mut a = RandomChance::seeded(7);
        let mut b = RandomChance::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.roll(0.3), b.roll(0.3));
            assert_eq!(a.pick_minutes(3..=5), b.pick_minutes(3..=5));
        }
    }

    #[test]
    fn random_minutes_stay_in_range() {
        let mut chance = RandomChance::seeded(99);
        for _ in 0..200 {
            let m = chance.pick_minutes(3..=5);
            assert!((3..=5).contains(&m));
        }
    }

    #[test]
    fn extreme_probabilities_are_certain() {
        let mut chance = RandomChance::seeded(1);
        assert!(chance.roll(1.0));
        assert!(!chance.roll(0.0));
        assert!(chance.roll(7.5));
        assert!(!chance.roll(f64::NAN));
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn empty_range_yields_start() {
        let mut chance = RandomChance::seeded(1);
        assert_eq!(chance.pick_minutes(5..=3), 5);
    }

    #[test]
    fn scripted_replays_then_defaults() {
        let mut chance = ScriptedChance::never()
            .with_rolls([true, false])
            .with_minutes([9, 1]);
        assert!(chance.roll(0.3));
        assert!(!chance.roll(0.3));
        assert!(!chance.roll(0.3));
        assert_eq!(chance.pick_minutes(3..=5), 5);
        assert_eq!(chance.pick_minutes(3..=5), 3);
        assert_eq!(chance.pick_minutes(3..=5), 3);
    }

    #[test]
    fn always_rolls_true() {
        let mut chance = ScriptedChance::always();
        assert!(chance.roll(0.0));
    }
}
