use chrono::{DateTime, Utc};

use crate::MeterstatError;
use crate::types::{Bucket, Checkpoint, CumulativePoint, NegativeDeltas, SeriesKey};

/// Result of one accumulation pass over a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulation {
    /// Points strictly newer than the input checkpoint, ascending.
    pub points: Vec<CumulativePoint>,
    /// Checkpoint after the pass; equal to the input when nothing was emitted.
    pub checkpoint: Option<Checkpoint>,
}

impl Accumulation {
    /// Newest interval emitted by this pass, if any.
    #[must_use]
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.interval_start)
    }
}

/// Turn buckets into running-sum points, resuming after `checkpoint`.
///
/// - Buckets are sorted ascending before anything else.
/// - Buckets at or before `checkpoint.last_interval_start` are skipped, which
///   makes replaying an overlapping fetch window a no-op.
/// - Every remaining bucket adds its total to the running sum, starting from
///   `checkpoint.last_sum` (or zero without a checkpoint).
///
/// # Errors
/// - `Data` if two buckets share an interval start.
/// - `Data` if a bucket to be emitted is negative and `negatives` is `Reject`.
///
/// ```
/// use chrono::{DateTime, Utc};
/// use meterstat_core::{Bucket, Checkpoint, NegativeDeltas, SeriesKey, accumulate};
///
/// let t = |h: i64| DateTime::<Utc>::from_timestamp(h * 3600, 0).unwrap();
/// let key = SeriesKey::from_raw("demo_e1");
/// let cp = Checkpoint { series: key.clone(), last_sum: 10.0, last_interval_start: t(0) };
/// let buckets = vec![
///     Bucket::from((t(0), 2.0)),
///     Bucket::from((t(1), 3.0)),
///     Bucket::from((t(2), 1.0)),
/// ];
///
/// let acc = accumulate(&key, buckets, Some(&cp), NegativeDeltas::Allow).unwrap();
/// let sums: Vec<f64> = acc.points.iter().map(|p| p.sum).collect();
/// assert_eq!(sums, vec![13.0, 14.0]);
/// assert_eq!(acc.checkpoint.unwrap().last_interval_start, t(2));
/// ```
pub fn accumulate<I>(
    series: &SeriesKey,
    buckets: I,
    checkpoint: Option<&Checkpoint>,
    negatives: NegativeDeltas,
) -> Result<Accumulation, MeterstatError>
where
    I: IntoIterator<Item = Bucket>,
{
    let mut buckets: Vec<Bucket> = buckets.into_iter().collect();
    buckets.sort_by_key(|b| b.interval_start);

    if let Some(pair) = buckets
        .windows(2)
        .find(|w| w[0].interval_start == w[1].interval_start)
    {
        return Err(MeterstatError::Data(format!(
            "duplicate bucket for {series} at {}",
            pair[0].interval_start
        )));
    }

    let resume_after = checkpoint.map(|c| c.last_interval_start);
    let mut running = checkpoint.map_or(0.0, |c| c.last_sum);
    let mut points: Vec<CumulativePoint> = Vec::new();
    let mut skipped = 0usize;

    for b in buckets {
        if resume_after.is_some_and(|last| b.interval_start <= last) {
            skipped += 1;
            continue;
        }
        if b.total < 0.0 && negatives == NegativeDeltas::Reject {
            return Err(MeterstatError::Data(format!(
                "negative delta {} for {series} at {}",
                b.total, b.interval_start
            )));
        }
        running += b.total;
        points.push(CumulativePoint {
            interval_start: b.interval_start,
            delta: b.total,
            sum: running,
        });
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        series = %series,
        emitted = points.len(),
        skipped,
        resume_after = ?resume_after,
        "accumulated buckets"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = skipped;

    let checkpoint = match points.last() {
        Some(last) => Some(Checkpoint {
            series: series.clone(),
            last_sum: last.sum,
            last_interval_start: last.interval_start,
        }),
        None => checkpoint.cloned(),
    };

    Ok(Accumulation { points, checkpoint })
}
