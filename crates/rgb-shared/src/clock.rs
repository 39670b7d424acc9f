//! Simulated clock for deterministic stepping.

use std::time::Duration;

use serde::Deserialize;

/// Clock settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Simulated time per tick, in milliseconds.
    pub step_ms: u64,
    pub start_tick: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            step_ms: 50, // 20 TPS
            start_tick: 0,
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    tick: u64,
    elapsed: Duration,
    step: Duration,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::from_config(&ClockConfig::default())
    }
}

impl SimClock {
    #[must_use]
    pub const fn new(step: Duration) -> Self {
        Self {
            tick: 0,
            elapsed: Duration::ZERO,
            step,
        }
    }

    /// Build from config. Elapsed time starts at `start_tick * step`.
    #[must_use]
    pub fn from_config(config: &ClockConfig) -> Self {
        let step = Duration::from_millis(config.step_ms);
        Self {
            tick: config.start_tick,
            elapsed: step.saturating_mul(u32::try_from(config.start_tick).unwrap_or(u32::MAX)),
            step,
        }
    }

    /// Advance one tick.
    pub fn advance(&mut self) {
        self.advance_by(1);
    }

    /// Advance `ticks` ticks.
    pub fn advance_by(&mut self, ticks: u32) {
        self.tick += u64::from(ticks);
        self.elapsed = self.elapsed.saturating_add(self.step.saturating_mul(ticks));
    }

    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Simulated time per tick.
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }
}
