//! Deterministic in-memory collaborators for meterstat tests and examples.
//!
//! - [`MockUsageSource`] and [`MockExportSource`] replay scripted behaviors and
//!   record every call.
//! - [`InMemoryCheckpointStore`] keeps appended points per series, rejects
//!   appends that would rewrite history, and supports failure injection.
//! - [`fixtures`] builds usage records and CSV export bodies.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use meterstat_core::{
    Checkpoint, CheckpointStore, CumulativePoint, ExportSource, MeterstatError, SeriesKey,
    StatisticMetadata, UsageRecord, UsageSource,
};

pub mod fixtures;

/// Instruction for how one call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Sleep, then return the provided value.
    Delay(Duration, T),
    /// Fail immediately with the provided error.
    Fail(MeterstatError),
    /// Hang indefinitely (simulate a stalled upstream).
    Hang,
}

impl<T: Clone> MockBehavior<T> {
    async fn play(&self) -> Result<T, MeterstatError> {
        match self {
            Self::Return(v) => Ok(v.clone()),
            Self::Delay(d, v) => {
                tokio::time::sleep(*d).await;
                Ok(v.clone())
            }
            Self::Fail(e) => Err(e.clone()),
            Self::Hang => std::future::pending().await,
        }
    }
}

struct Script<T, C> {
    queue: VecDeque<MockBehavior<T>>,
    fallback: MockBehavior<T>,
    calls: Vec<C>,
}

impl<T: Clone, C> Script<T, C> {
    const fn new(fallback: MockBehavior<T>) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback,
            calls: Vec::new(),
        }
    }

    fn next(&mut self, call: C) -> MockBehavior<T> {
        self.calls.push(call);
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// One recorded `usage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageCall {
    /// Requested site.
    pub site_id: String,
    /// First requested date.
    pub start: NaiveDate,
    /// Last requested date.
    pub end: NaiveDate,
}

/// Usage source replaying queued behaviors, then a fallback.
pub struct MockUsageSource {
    name: &'static str,
    script: Mutex<Script<Vec<UsageRecord>, UsageCall>>,
}

impl MockUsageSource {
    /// Source that always returns `records`.
    #[must_use]
    pub fn returning(records: Vec<UsageRecord>) -> Self {
        Self::with_fallback(MockBehavior::Return(records))
    }

    /// Source that always fails with a recoverable fetch error.
    #[must_use]
    pub fn failing(msg: &str) -> Self {
        Self::with_fallback(MockBehavior::Fail(MeterstatError::fetch(
            "meterstat-mock",
            msg,
        )))
    }

    /// Source whose unscripted calls behave like `fallback`.
    #[must_use]
    pub fn with_fallback(fallback: MockBehavior<Vec<UsageRecord>>) -> Self {
        Self {
            name: "meterstat-mock",
            script: Mutex::new(Script::new(fallback)),
        }
    }

    /// Queue a behavior for the next unscripted call.
    pub async fn push(&self, behavior: MockBehavior<Vec<UsageRecord>>) {
        self.script.lock().await.queue.push_back(behavior);
    }

    /// All calls received so far.
    pub async fn calls(&self) -> Vec<UsageCall> {
        self.script.lock().await.calls.clone()
    }
}

#[async_trait]
impl UsageSource for MockUsageSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn usage(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>, MeterstatError> {
        // Take the behavior without holding the lock across the await.
        let behavior = self.script.lock().await.next(UsageCall {
            site_id: site_id.to_string(),
            start,
            end,
        });
        behavior.play().await
    }
}

/// Export source replaying queued CSV bodies, then a fallback.
pub struct MockExportSource {
    script: Mutex<Script<String, (NaiveDate, NaiveDate)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockExportSource {
    /// Source that always returns `body`.
    #[must_use]
    pub fn returning(body: impl Into<String>) -> Self {
        Self::with_fallback(MockBehavior::Return(body.into()))
    }

    /// Source that always fails with a recoverable fetch error.
    #[must_use]
    pub fn failing(msg: &str) -> Self {
        Self::with_fallback(MockBehavior::Fail(MeterstatError::fetch(
            "meterstat-mock-export",
            msg,
        )))
    }

    /// Source whose unscripted calls behave like `fallback`.
    #[must_use]
    pub fn with_fallback(fallback: MockBehavior<String>) -> Self {
        Self {
            script: Mutex::new(Script::new(fallback)),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue a behavior for the next unscripted call.
    pub async fn push(&self, behavior: MockBehavior<String>) {
        self.script.lock().await.queue.push_back(behavior);
    }

    /// Requested `(from, to)` windows so far.
    pub async fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.script.lock().await.calls.clone()
    }

    /// Highest number of exports that were running at the same time.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExportSource for MockExportSource {
    fn name(&self) -> &'static str {
        "meterstat-mock-export"
    }

    async fn export(&self, from: NaiveDate, to: NaiveDate) -> Result<String, MeterstatError> {
        let behavior = self.script.lock().await.next((from, to));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let out = behavior.play().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[derive(Default)]
struct StoreState {
    points: BTreeMap<SeriesKey, Vec<CumulativePoint>>,
    metadata: BTreeMap<SeriesKey, StatisticMetadata>,
    seeded: BTreeMap<SeriesKey, Checkpoint>,
    fail_last: HashSet<SeriesKey>,
    fail_append: HashSet<SeriesKey>,
}

/// Checkpoint store keeping everything in memory.
///
/// Appends must be strictly newer than the current checkpoint; anything else
/// is reported as a `Persistence` error, which makes overlapping cycles for
/// the same series visible in tests.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    state: Mutex<StoreState>,
    latency: Option<Duration>,
    last_calls: AtomicUsize,
    append_calls: AtomicUsize,
}

impl InMemoryCheckpointStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add latency to every `last` and `append` call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Pretend `checkpoint` was persisted by an earlier run.
    pub async fn seed(&self, checkpoint: Checkpoint) {
        self.state
            .lock()
            .await
            .seeded
            .insert(checkpoint.series.clone(), checkpoint);
    }

    /// Make `last` fail for `series`.
    pub async fn fail_reads_for(&self, series: SeriesKey) {
        self.state.lock().await.fail_last.insert(series);
    }

    /// Make `append` fail for `series`.
    pub async fn fail_appends_for(&self, series: SeriesKey) {
        self.state.lock().await.fail_append.insert(series);
    }

    /// Remove all injected failures.
    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.fail_last.clear();
        state.fail_append.clear();
    }

    /// Points appended to `series`, in order.
    pub async fn points(&self, series: &SeriesKey) -> Vec<CumulativePoint> {
        self.state
            .lock()
            .await
            .points
            .get(series)
            .cloned()
            .unwrap_or_default()
    }

    /// Metadata of the last append to `series`.
    pub async fn metadata(&self, series: &SeriesKey) -> Option<StatisticMetadata> {
        self.state.lock().await.metadata.get(series).cloned()
    }

    /// Series that received at least one append.
    pub async fn series(&self) -> Vec<SeriesKey> {
        self.state.lock().await.points.keys().cloned().collect()
    }

    /// Number of `last` calls.
    #[must_use]
    pub fn last_calls(&self) -> usize {
        self.last_calls.load(Ordering::SeqCst)
    }

    /// Number of `append` calls, including failed ones.
    #[must_use]
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }
}

fn checkpoint_of(state: &StoreState, series: &SeriesKey) -> Option<Checkpoint> {
    state
        .points
        .get(series)
        .and_then(|pts| pts.last())
        .map(|p| Checkpoint {
            series: series.clone(),
            last_sum: p.sum,
            last_interval_start: p.interval_start,
        })
        .or_else(|| state.seeded.get(series).cloned())
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn last(&self, series: &SeriesKey) -> Result<Option<Checkpoint>, MeterstatError> {
        self.last_calls.fetch_add(1, Ordering::SeqCst);
        let out = {
            let state = self.state.lock().await;
            if state.fail_last.contains(series) {
                return Err(MeterstatError::persistence(
                    series.as_str(),
                    "injected read failure",
                ));
            }
            checkpoint_of(&state, series)
        };
        self.pause().await;
        Ok(out)
    }

    async fn append(
        &self,
        series: &SeriesKey,
        metadata: &StatisticMetadata,
        points: Vec<CumulativePoint>,
    ) -> Result<(), MeterstatError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut state = self.state.lock().await;
        if state.fail_append.contains(series) {
            return Err(MeterstatError::persistence(
                series.as_str(),
                "injected write failure",
            ));
        }
        let mut last = checkpoint_of(&state, series).map(|c| c.last_interval_start);
        for p in &points {
            if last.is_some_and(|l| p.interval_start <= l) {
                return Err(MeterstatError::persistence(
                    series.as_str(),
                    format!("append at {} does not extend the series", p.interval_start),
                ));
            }
            last = Some(p.interval_start);
        }
        state.metadata.insert(series.clone(), metadata.clone());
        state.points.entry(series.clone()).or_default().extend(points);
        Ok(())
    }
}
