//! Configuration types shared across the coordinator and the interval store.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Policy applied when a bucket carries a negative delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NegativeDeltas {
    /// Accept negative deltas; the running sum may decrease (e.g. feed-in credits).
    #[default]
    Allow,
    /// Fail the series cycle with a `Data` error and leave its checkpoint untouched.
    Reject,
}

/// Configuration for the hourly usage coordinator (pipeline 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Integration domain used as the statistic id namespace.
    pub domain: String,
    /// Title of the configured site entry; folded into statistic ids.
    pub entry_title: String,
    /// Upstream site identifier passed to the usage source.
    pub site_id: String,
    /// How many days back each refresh asks the usage source for.
    pub lookback_days: u32,
    /// Bucket width in minutes; must divide a day.
    pub bucket_minutes: i64,
    /// Site timezone, used to decide what "today" is.
    pub timezone: Tz,
    /// Handling of negative deltas in the accumulator.
    pub negative_deltas: NegativeDeltas,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            domain: "amberelectric_usages".to_string(),
            entry_title: String::new(),
            site_id: String::new(),
            lookback_days: 28,
            bucket_minutes: 60,
            timezone: chrono_tz::Australia::Sydney,
            negative_deltas: NegativeDeltas::default(),
        }
    }
}

/// Configuration for the interval export store and its DAO (pipeline 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Timezone the export's naive local times are expressed in.
    pub timezone: Tz,
    /// Interval width of the export in minutes.
    pub interval_minutes: i64,
    /// Days of history kept in memory relative to the latest data date.
    pub retention_days: u32,
    /// Days of history requested from the portal on each re-download.
    pub fetch_range_days: u32,
    /// Trailing window, in days, averaged by the default estimator.
    pub estimator_window_days: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Australia::Brisbane,
            interval_minutes: 5,
            retention_days: 60,
            fetch_range_days: 60,
            estimator_window_days: 30,
        }
    }
}
