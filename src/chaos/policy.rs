//! Runtime-tunable latency injection.
//!
//! Four process-wide knobs, each an independent atomic:
//! - delay: base stall in milliseconds
//! - variance: width of the uniform jitter window around the delay
//! - chance: percent probability that a captured request stalls
//! - limit: in-flight request ceiling used by the admission guard
//!
//! Each field is read and written atomically on its own. There is NO
//! joint snapshot: a configuration call that sets delay and chance can be
//! observed half-applied by a concurrent request.

use crate::error::PutterError;
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Width of the probability draw: uniform integer in [0, 100).
const CHANCE_RANGE: i64 = 100;

/// One tunable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaosField {
    DelayMs,
    VarianceMs,
    ChancePercent,
    InFlightLimit,
}

impl ChaosField {
    /// Fields in the order they are applied and echoed.
    pub const ALL: [ChaosField; 4] = [
        ChaosField::DelayMs,
        ChaosField::VarianceMs,
        ChaosField::ChancePercent,
        ChaosField::InFlightLimit,
    ];

    /// Query-string key that sets this field.
    pub fn query_key(self) -> &'static str {
        match self {
            ChaosField::DelayMs => "delay",
            ChaosField::VarianceMs => "variance",
            ChaosField::ChancePercent => "chance",
            ChaosField::InFlightLimit => "limit",
        }
    }
}

impl FromStr for ChaosField {
    type Err = PutterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChaosField::ALL
            .into_iter()
            .find(|field| field.query_key() == s)
            .ok_or_else(|| PutterError::UnknownChaosField(s.to_string()))
    }
}

/// Shared chaos configuration.
#[derive(Debug, Default)]
pub struct ChaosPolicy {
    delay_ms: AtomicI64,
    variance_ms: AtomicI64,
    chance_percent: AtomicI64,
    inflight_limit: AtomicI64,
}

impl ChaosPolicy {
    /// All fields zero: no stall, no admission limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an admission limit taken from startup configuration.
    pub fn with_limit(limit: i64) -> Self {
        let policy = Self::new();
        policy.configure(ChaosField::InFlightLimit, limit);
        policy
    }

    fn slot(&self, field: ChaosField) -> &AtomicI64 {
        match field {
            ChaosField::DelayMs => &self.delay_ms,
            ChaosField::VarianceMs => &self.variance_ms,
            ChaosField::ChancePercent => &self.chance_percent,
            ChaosField::InFlightLimit => &self.inflight_limit,
        }
    }

    /// Overwrite one field.
    pub fn configure(&self, field: ChaosField, value: i64) {
        self.slot(field).store(value, Ordering::Relaxed);
    }

    pub fn get(&self, field: ChaosField) -> i64 {
        self.slot(field).load(Ordering::Relaxed)
    }

    /// Current admission ceiling. Zero or negative means unlimited.
    pub fn inflight_limit(&self) -> i64 {
        self.get(ChaosField::InFlightLimit)
    }

    /// Field-by-field read of the current settings (not a joint snapshot).
    pub fn snapshot(&self) -> ChaosSnapshot {
        ChaosSnapshot {
            delay_ms: self.get(ChaosField::DelayMs),
            variance_ms: self.get(ChaosField::VarianceMs),
            chance_percent: self.get(ChaosField::ChancePercent),
            inflight_limit: self.get(ChaosField::InFlightLimit),
        }
    }

    /// Decide whether the current request stalls, using the thread-local RNG.
    pub fn decide(&self) -> Option<Duration> {
        self.decide_with(&mut rand::thread_rng())
    }

    /// Decide whether to stall and for how long.
    ///
    /// Returns:
    /// - None if chance <= 0 or the draw misses
    /// - Some(duration) otherwise; duration may be zero
    ///
    /// Algorithm:
    /// 1. draw uniform in [0, 100); stall iff chance >= draw
    /// 2. shift = uniform in [0, variance) - variance/2 (only if variance > 0)
    /// 3. total = delay + shift, clamped to zero when negative
    pub fn decide_with<R: Rng>(&self, rng: &mut R) -> Option<Duration> {
        let chance = self.get(ChaosField::ChancePercent);
        if chance <= 0 {
            return None;
        }

        let draw = rng.gen_range(0..CHANCE_RANGE);
        if chance < draw {
            return None;
        }

        let delay = self.get(ChaosField::DelayMs);
        let variance = self.get(ChaosField::VarianceMs);
        let shift = if variance > 0 {
            rng.gen_range(0..variance) - variance / 2
        } else {
            0
        };

        let total = delay.saturating_add(shift).max(0);
        Some(Duration::from_millis(total as u64))
    }
}

/// Point-in-time copy of the four fields, as echoed by the config endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChaosSnapshot {
    pub delay_ms: i64,
    pub variance_ms: i64,
    pub chance_percent: i64,
    pub inflight_limit: i64,
}

impl fmt::Display for ChaosSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "delay: {}ms", self.delay_ms)?;
        writeln!(f, "variance: {}ms", self.variance_ms)?;
        writeln!(f, "chance: {}%", self.chance_percent)?;
        writeln!(f, "limit: {}", self.inflight_limit)
    }
}
