//! Usage API records.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeDelta, TimeZone};

use meterstat_core::UsageRecord;

/// AEST, the offset the retail usage API reports in.
#[must_use]
pub fn aest() -> FixedOffset {
    FixedOffset::east_opt(10 * 3600).unwrap()
}

/// One record starting at `start`.
#[must_use]
pub fn record(
    channel: &str,
    start: DateTime<FixedOffset>,
    kwh: f64,
    cost_cents: f64,
) -> UsageRecord {
    UsageRecord {
        channel_identifier: channel.to_string(),
        start_time: start,
        kwh,
        cost: cost_cents,
    }
}

/// Forty-eight half-hourly records covering `day` in `offset`, each with the
/// same energy and cost.
#[must_use]
pub fn half_hourly_day(
    channel: &str,
    day: NaiveDate,
    offset: FixedOffset,
    kwh: f64,
    cost_cents: f64,
) -> Vec<UsageRecord> {
    let midnight = offset
        .from_local_datetime(&day.and_hms_opt(0, 0, 0).unwrap())
        .unwrap();
    (0..48)
        .map(|i| record(channel, midnight + TimeDelta::minutes(30 * i), kwh, cost_cents))
        .collect()
}
