use std::collections::BTreeMap;

use chrono::offset::Offset;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::MeterstatError;
use crate::types::{Reading, ReadingKind};

const DAY_MINUTES: i64 = 24 * 60;

/// Fixed width of an aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketWidth {
    minutes: i64,
}

impl BucketWidth {
    /// Hourly buckets used for usage API statistics.
    pub const HOURLY: Self = Self { minutes: 60 };
    /// Five-minute buckets used by interval exports.
    pub const FIVE_MINUTES: Self = Self { minutes: 5 };

    /// Build a width from minutes.
    ///
    /// # Errors
    /// Returns `InvalidArg` unless `minutes` is positive and divides a day,
    /// which keeps every bucket inside one local calendar day.
    pub fn from_minutes(minutes: i64) -> Result<Self, MeterstatError> {
        if minutes <= 0 || DAY_MINUTES % minutes != 0 {
            return Err(MeterstatError::InvalidArg(format!(
                "bucket width must be a positive divisor of {DAY_MINUTES} minutes, got {minutes}"
            )));
        }
        Ok(Self { minutes })
    }

    /// Width in minutes.
    #[must_use]
    pub const fn minutes(self) -> i64 {
        self.minutes
    }

    /// Width as a time delta.
    #[must_use]
    pub fn delta(self) -> TimeDelta {
        TimeDelta::minutes(self.minutes)
    }

    /// Truncate `ts` down to the start of its bucket.
    ///
    /// Flooring happens on the local wall clock of `ts` (its own offset), so a
    /// `+05:30` reading lands on its local hour; the result is returned in UTC
    /// so callers only ever compare aware instants.
    #[must_use]
    pub fn truncate<Tz: TimeZone>(self, ts: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let offset_seconds = i64::from(ts.offset().fix().local_minus_utc());
        bucket_minutes_with_offset(ts.timestamp(), self.minutes, offset_seconds)
    }
}

const fn bucket_minutes_with_offset(
    ts: i64,
    minutes: i64,
    offset_seconds: i64,
) -> Option<DateTime<Utc>> {
    let step = minutes * 60;
    let shifted = ts + offset_seconds;
    let bucket = shifted - shifted.rem_euclid(step);
    DateTime::from_timestamp(bucket - offset_seconds, 0)
}

/// Identity of one normalized series before it gets a statistic id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelKey {
    /// What the values measure.
    pub kind: ReadingKind,
    /// Upstream channel identifier, as delivered.
    pub channel: String,
}

/// Bucket totals keyed by interval start, ascending.
pub type Buckets = BTreeMap<DateTime<Utc>, f64>;

/// Group readings into fixed-width buckets per `(kind, channel)`.
///
/// - Each reading lands in the bucket containing its timestamp (floor).
/// - Values are scaled by [`ReadingKind::scale`] before summation, so cost
///   buckets hold dollars.
/// - Output maps are ordered by channel key and by interval start.
///
/// # Errors
/// Returns `Data` if a reading carries a non-finite value or a timestamp
/// whose bucket falls outside the representable range.
pub fn normalize<'a, I>(
    readings: I,
    width: BucketWidth,
) -> Result<BTreeMap<ChannelKey, Buckets>, MeterstatError>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut out: BTreeMap<ChannelKey, Buckets> = BTreeMap::new();
    for r in readings {
        if !r.value.is_finite() {
            return Err(MeterstatError::Data(format!(
                "non-finite {:?} value for channel {} at {}",
                r.kind, r.channel, r.timestamp
            )));
        }
        let start = width.truncate(&r.timestamp).ok_or_else(|| {
            MeterstatError::Data(format!(
                "timestamp {} of channel {} out of range",
                r.timestamp, r.channel
            ))
        })?;
        let key = ChannelKey {
            kind: r.kind,
            channel: r.channel.clone(),
        };
        *out.entry(key).or_default().entry(start).or_insert(0.0) += r.kind.scale(r.value);
    }
    Ok(out)
}
