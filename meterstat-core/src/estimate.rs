//! Gap estimation for interval series.

use core::fmt;

use chrono::{DateTime, Days};
use chrono_tz::Tz;

/// Outcome of an estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// An estimated value.
    Value(f64),
    /// No samples were available; distinct from an estimated zero.
    Unavailable,
}

impl Estimate {
    /// The estimated value, if any.
    #[must_use]
    pub const fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    /// The estimated value, with `Unavailable` degraded to `0.0`.
    #[must_use]
    pub const fn value_or_zero(self) -> f64 {
        match self {
            Self::Value(v) => v,
            Self::Unavailable => 0.0,
        }
    }

    /// True when an estimate was produced.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Lookup of an actual interval value at a local instant.
pub type Lookup<'a> = dyn Fn(DateTime<Tz>) -> Option<f64> + 'a;

/// Strategy supplying a value for an interval with no actual reading.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// Estimate the value at `at` using `lookup` to read actual values.
    fn estimate(&self, at: DateTime<Tz>, lookup: &Lookup<'_>) -> Estimate;
}

/// Average of the same local time-of-day over the preceding days.
///
/// With the default window of 30 the samples are `at - 1 day` through
/// `at - 30 days`. Days whose local time does not exist (DST gaps) and days
/// without an actual value are left out of the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingAverageEstimator {
    window_days: u32,
}

impl TrailingAverageEstimator {
    /// Estimator averaging over `window_days` prior days.
    #[must_use]
    pub const fn new(window_days: u32) -> Self {
        Self { window_days }
    }

    /// Number of prior days sampled.
    #[must_use]
    pub const fn window_days(&self) -> u32 {
        self.window_days
    }
}

impl Default for TrailingAverageEstimator {
    fn default() -> Self {
        Self::new(30)
    }
}

impl Estimator for TrailingAverageEstimator {
    fn estimate(&self, at: DateTime<Tz>, lookup: &Lookup<'_>) -> Estimate {
        let mut sum = 0.0;
        let mut count = 0u32;
        for back in 1..=self.window_days {
            let Some(day) = at.checked_sub_days(Days::new(u64::from(back))) else {
                continue;
            };
            if let Some(v) = lookup(day) {
                sum += v;
                count += 1;
            }
        }
        if count == 0 {
            return Estimate::Unavailable;
        }
        Estimate::Value(sum / f64::from(count))
    }
}
