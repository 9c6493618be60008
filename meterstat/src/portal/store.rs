//! Interval store with staleness, gap estimation and retention.

use std::sync::Arc;

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use meterstat_core::{
    BucketWidth, DataPoint, Estimate, Estimator, MergeReport, MeterstatError, PortalConfig,
    StreamKind, TrailingAverageEstimator,
};

use super::parse::{PointMap, parse_export};

/// Breakdown of a daily total by where each step's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailyTotal {
    /// Sum of actual and estimated step values.
    pub total: f64,
    /// Steps backed by an actual reading.
    pub actual_steps: usize,
    /// Steps filled by the estimator.
    pub estimated_steps: usize,
    /// Steps with neither; they contribute zero.
    pub unavailable_steps: usize,
}

/// In-memory cache of an interval export: consumption and feed-in points
/// keyed by instant, with gap estimation and bounded retention.
#[derive(Debug)]
pub struct IntervalStore {
    consumption: PointMap,
    feed_in: PointMap,
    latest_date: Option<NaiveDate>,
    timezone: Tz,
    width: BucketWidth,
    retention_days: u32,
    estimator: Arc<dyn Estimator>,
}

impl IntervalStore {
    /// Empty store configured from `cfg`, using a [`TrailingAverageEstimator`]
    /// over `cfg.estimator_window_days`.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `cfg.interval_minutes` does not divide a day.
    pub fn new(cfg: &PortalConfig) -> Result<Self, MeterstatError> {
        Ok(Self {
            consumption: PointMap::new(),
            feed_in: PointMap::new(),
            latest_date: None,
            timezone: cfg.timezone,
            width: BucketWidth::from_minutes(cfg.interval_minutes)?,
            retention_days: cfg.retention_days,
            estimator: Arc::new(TrailingAverageEstimator::new(cfg.estimator_window_days)),
        })
    }

    /// Replace the gap estimator.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn Estimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Site timezone of the export.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Newest date with stored data.
    #[must_use]
    pub const fn latest_date(&self) -> Option<NaiveDate> {
        self.latest_date
    }

    /// Number of stored points for `kind`.
    #[must_use]
    pub fn len(&self, kind: StreamKind) -> usize {
        self.points(kind).len()
    }

    /// True when neither stream holds any point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumption.is_empty() && self.feed_in.is_empty()
    }

    /// Stored point covering `at`, if any.
    #[must_use]
    pub fn point(&self, kind: StreamKind, at: DateTime<Tz>) -> Option<&DataPoint> {
        let key = self.width.truncate(&at)?;
        self.points(kind).get(&key)
    }

    /// True with no data, or when `now`'s local date is more than one day past
    /// the latest stored date.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Tz>) -> bool {
        let Some(latest) = self.latest_date else {
            return true;
        };
        let today = now.with_timezone(&self.timezone).date_naive();
        (today - latest).num_days() > 1
    }

    /// Actual value of the interval containing `at`.
    #[must_use]
    pub fn actual(&self, kind: StreamKind, at: DateTime<Tz>) -> Option<f64> {
        self.point(kind, at).map(|p| p.value)
    }

    /// Estimated value of the interval containing `at`, from prior actuals.
    #[must_use]
    pub fn estimated(&self, kind: StreamKind, at: DateTime<Tz>) -> Estimate {
        let at = at.with_timezone(&self.timezone);
        self.estimator
            .estimate(at, &|t: DateTime<Tz>| self.actual(kind, t))
    }

    /// Sum of `kind` from local midnight of `until`'s date through `until`
    /// inclusive, one step per interval, each step actual or else estimated.
    ///
    /// Steps follow the local wall clock: a repeated hour on a DST fall-back
    /// day is counted once (at its earlier instant, where the export stores
    /// it) and skipped local times are not counted at all.
    #[must_use]
    pub fn daily_total(&self, kind: StreamKind, until: DateTime<Tz>) -> DailyTotal {
        let until = until.with_timezone(&self.timezone);
        let mut out = DailyTotal::default();
        for step in self.local_steps(until) {
            if let Some(v) = self.actual(kind, step) {
                out.total += v;
                out.actual_steps += 1;
            } else {
                match self.estimated(kind, step) {
                    Estimate::Value(v) => {
                        out.total += v;
                        out.estimated_steps += 1;
                    }
                    Estimate::Unavailable => out.unavailable_steps += 1,
                }
            }
        }
        out
    }

    /// Consumption total for `until`'s local day, see [`IntervalStore::daily_total`].
    #[must_use]
    pub fn total_daily_consumption(&self, until: DateTime<Tz>) -> f64 {
        self.daily_total(StreamKind::Consumption, until).total
    }

    /// Every stored point of `kind` with its instant, ascending.
    pub fn iter(&self, kind: StreamKind) -> impl Iterator<Item = (DateTime<Utc>, &DataPoint)> {
        self.points(kind).iter().map(|(k, v)| (*k, v))
    }

    /// Merge decoded export rows.
    ///
    /// Rows are parsed in full first; on any parse error the store is left
    /// untouched. Points at an existing instant are overwritten, the latest
    /// date only moves forward, and points older than the retention window
    /// are evicted afterwards.
    ///
    /// # Errors
    /// Returns `Parse` for a malformed batch.
    pub fn merge_data(&mut self, rows: &[Vec<String>]) -> Result<MergeReport, MeterstatError> {
        let parsed = parse_export(rows, self.timezone, self.width)?;

        let report_consumption = parsed.consumption.len();
        let report_feed_in = parsed.feed_in.len();
        self.consumption.extend(parsed.consumption);
        self.feed_in.extend(parsed.feed_in);
        self.latest_date = self.latest_date.max(parsed.latest_date);
        let evicted = self.evict();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            consumption = report_consumption,
            feed_in = report_feed_in,
            skipped = parsed.skipped_rows,
            evicted,
            latest = ?self.latest_date,
            "merged export rows"
        );

        Ok(MergeReport {
            consumption: report_consumption,
            feed_in: report_feed_in,
            skipped_rows: parsed.skipped_rows,
            evicted,
            latest_date: self.latest_date,
            warnings: parsed.warnings,
        })
    }

    fn evict(&mut self) -> usize {
        let Some(cutoff) = self
            .latest_date
            .and_then(|d| d.checked_sub_days(Days::new(u64::from(self.retention_days))))
        else {
            return 0;
        };
        let before = self.consumption.len() + self.feed_in.len();
        self.consumption.retain(|_, p| p.date >= cutoff);
        self.feed_in.retain(|_, p| p.date >= cutoff);
        before - (self.consumption.len() + self.feed_in.len())
    }

    const fn points(&self, kind: StreamKind) -> &PointMap {
        match kind {
            StreamKind::Consumption => &self.consumption,
            StreamKind::FeedIn => &self.feed_in,
        }
    }

    fn local_steps(&self, until: DateTime<Tz>) -> Vec<DateTime<Tz>> {
        let date = until.date_naive();
        let end = until.naive_local();
        let mut steps = Vec::new();
        let mut t = NaiveTime::MIN;
        loop {
            let local = date.and_time(t);
            if local > end {
                break;
            }
            match self.timezone.from_local_datetime(&local) {
                LocalResult::Single(s) | LocalResult::Ambiguous(s, _) => steps.push(s),
                LocalResult::None => {}
            }
            let (next, wrapped) = t.overflowing_add_signed(self.width.delta());
            if wrapped != 0 {
                break;
            }
            t = next;
        }
        steps
    }
}
