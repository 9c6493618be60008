//! Report envelopes produced by the coordinator and the interval store.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MeterstatError;
use crate::series::SeriesKey;

/// Summary of one coordinator refresh.
///
/// Carries the number of points appended per series, the newest interval
/// written in this refresh, and the per-series failures that did not stop
/// the other series from completing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Points appended per series; series with nothing new map to zero.
    pub appended: BTreeMap<SeriesKey, usize>,
    /// Newest interval start appended during this refresh, if any.
    pub latest: Option<DateTime<Utc>>,
    /// Non-fatal issues encountered while building the report.
    pub warnings: Vec<MeterstatError>,
}

impl RefreshReport {
    /// Total number of points appended across all series.
    #[must_use]
    pub fn total_appended(&self) -> usize {
        self.appended.values().sum()
    }
}

/// Summary of one export merge into the interval store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeReport {
    /// Consumption data points written (inserted or overwritten).
    pub consumption: usize,
    /// Feed-in data points written (inserted or overwritten).
    pub feed_in: usize,
    /// Data rows skipped because their stream was unknown or missing.
    pub skipped_rows: usize,
    /// Data points dropped by the retention window after the merge.
    pub evicted: usize,
    /// Latest data date held by the store after the merge.
    pub latest_date: Option<NaiveDate>,
    /// Non-fatal issues encountered while merging.
    pub warnings: Vec<MeterstatError>,
}
