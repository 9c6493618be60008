//! Domain types for readings, buckets, checkpoints, and interval data points,
//! plus re-exports from `meterstat-types`.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub use meterstat_types::{
    CoordinatorConfig, MergeReport, MeterstatError, NegativeDeltas, PortalConfig, RefreshReport,
    SeriesKey, StatisticMetadata, Unit, statistic_prefix,
};

/// What a reading measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ReadingKind {
    /// Energy drawn through a usage-API channel, in kWh.
    Usage,
    /// Cost of a usage-API channel, delivered in cents.
    Cost,
    /// Energy exported to the grid from an export stream, in kWh.
    SolarFeedIn,
    /// Energy consumed from the grid from an export stream, in kWh.
    Consumption,
}

impl ReadingKind {
    /// Convert a raw source value into the unit accumulated for this kind.
    ///
    /// Costs arrive in cents and are accumulated in dollars.
    #[must_use]
    pub fn scale(self, raw: f64) -> f64 {
        match self {
            Self::Cost => raw / 100.0,
            Self::Usage | Self::SolarFeedIn | Self::Consumption => raw,
        }
    }

    /// Unit of the scaled value.
    #[must_use]
    pub const fn unit(self) -> Unit {
        match self {
            Self::Cost => Unit::Dollar,
            Self::Usage | Self::SolarFeedIn | Self::Consumption => Unit::KilowattHour,
        }
    }
}

/// One raw reading for a channel at an aware instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Upstream channel or stream identifier.
    pub channel: String,
    /// Start of the measured interval, in the source's own offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Raw value in the source's unit (cents for cost).
    pub value: f64,
    /// What the value measures.
    pub kind: ReadingKind,
}

/// One row returned by a usage API: energy and cost for a channel interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Channel identifier, e.g. `E1` or `B1`.
    pub channel_identifier: String,
    /// Interval start as reported by the API.
    pub start_time: DateTime<FixedOffset>,
    /// Energy in kWh.
    pub kwh: f64,
    /// Cost in cents.
    pub cost: f64,
}

impl UsageRecord {
    /// Split the record into its usage and cost readings.
    #[must_use]
    pub fn readings(&self) -> [Reading; 2] {
        [
            Reading {
                channel: self.channel_identifier.clone(),
                timestamp: self.start_time,
                value: self.kwh,
                kind: ReadingKind::Usage,
            },
            Reading {
                channel: self.channel_identifier.clone(),
                timestamp: self.start_time,
                value: self.cost,
                kind: ReadingKind::Cost,
            },
        ]
    }
}

/// Aggregated value of one fixed-width interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Interval start, truncated to the bucket width.
    pub interval_start: DateTime<Utc>,
    /// Sum of all readings falling in `[interval_start, interval_start + width)`.
    pub total: f64,
}

impl From<(DateTime<Utc>, f64)> for Bucket {
    fn from((interval_start, total): (DateTime<Utc>, f64)) -> Self {
        Self {
            interval_start,
            total,
        }
    }
}

/// Last persisted cumulative point of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Series the checkpoint belongs to.
    pub series: SeriesKey,
    /// Running sum at `last_interval_start`.
    pub last_sum: f64,
    /// Newest interval already persisted.
    pub last_interval_start: DateTime<Utc>,
}

/// One emitted point of a running-sum statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CumulativePoint {
    /// Interval start of the bucket this point represents.
    pub interval_start: DateTime<Utc>,
    /// Value of the bucket itself.
    pub delta: f64,
    /// Running sum including this bucket.
    pub sum: f64,
}

/// Flow direction of an interval export stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Grid consumption (`E1`).
    Consumption,
    /// Solar feed-in (`B1`).
    FeedIn,
}

impl StreamKind {
    /// Reading kind stored for this stream.
    #[must_use]
    pub const fn reading_kind(self) -> ReadingKind {
        match self {
            Self::Consumption => ReadingKind::Consumption,
            Self::FeedIn => ReadingKind::SolarFeedIn,
        }
    }
}

/// Stream code found in an export's `Stream ID` row.
///
/// Unknown codes are kept verbatim so callers must decide what to do with
/// them instead of silently dropping or misfiling the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCode {
    /// A code mapped to a stream kind.
    Known(StreamKind),
    /// A code this crate does not understand.
    Unknown(String),
}

impl StreamCode {
    /// Classify a raw stream code.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "B1" => Self::Known(StreamKind::FeedIn),
            "E1" => Self::Known(StreamKind::Consumption),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One interval value of an export, in the site's local calendar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Local date of the interval.
    pub date: NaiveDate,
    /// Local start time of the interval.
    pub time: NaiveTime,
    /// Energy in kWh.
    pub value: f64,
}
