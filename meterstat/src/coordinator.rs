use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};

use meterstat_core::{
    Bucket, BucketWidth, Buckets, ChannelKey, CheckpointStore, CoordinatorConfig, MeterstatError,
    NegativeDeltas, ReadingKind, RefreshReport, SeriesKey, StatisticMetadata, UsageSource,
    accumulate, normalize, statistic_prefix,
};

const USAGE_SUFFIX: &str = "usages";
const COST_SUFFIX: &str = "usage_costs";

/// Pulls usage from a [`UsageSource`] and appends hourly running sums to a
/// [`CheckpointStore`], once per bucket and resumable across restarts.
pub struct UsageCoordinator {
    source: Arc<dyn UsageSource>,
    store: Arc<dyn CheckpointStore>,
    cfg: CoordinatorConfig,
    width: BucketWidth,
    usage_prefix: String,
    cost_prefix: String,
    series_locks: Mutex<HashMap<SeriesKey, Arc<Mutex<()>>>>,
    latest: RwLock<Option<DateTime<Utc>>>,
}

/// Builder for constructing a [`UsageCoordinator`].
pub struct UsageCoordinatorBuilder {
    source: Option<Arc<dyn UsageSource>>,
    store: Option<Arc<dyn CheckpointStore>>,
    cfg: CoordinatorConfig,
}

impl Default for UsageCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageCoordinatorBuilder {
    /// Create a builder with [`CoordinatorConfig::default`] and no collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            cfg: CoordinatorConfig::default(),
        }
    }

    /// Upstream usage source.
    #[must_use]
    pub fn usage_source(mut self, source: Arc<dyn UsageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Statistics engine holding the checkpoints.
    #[must_use]
    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, cfg: CoordinatorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Site identifier passed to the usage source.
    #[must_use]
    pub fn site_id(mut self, site_id: impl Into<String>) -> Self {
        self.cfg.site_id = site_id.into();
        self
    }

    /// Entry title folded into statistic ids.
    #[must_use]
    pub fn entry_title(mut self, title: impl Into<String>) -> Self {
        self.cfg.entry_title = title.into();
        self
    }

    /// Days of history requested on each refresh.
    ///
    /// Longer windows re-read more already-persisted buckets (skipped by the
    /// accumulator) in exchange for picking up late corrections.
    #[must_use]
    pub const fn lookback_days(mut self, days: u32) -> Self {
        self.cfg.lookback_days = days;
        self
    }

    /// Site timezone used by [`UsageCoordinator::refresh_now`].
    #[must_use]
    pub const fn timezone(mut self, tz: Tz) -> Self {
        self.cfg.timezone = tz;
        self
    }

    /// Policy for negative bucket totals.
    #[must_use]
    pub const fn negative_deltas(mut self, policy: NegativeDeltas) -> Self {
        self.cfg.negative_deltas = policy;
        self
    }

    /// Build the coordinator.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the source or store is missing, the site id is
    /// empty, or the configured bucket width does not divide a day.
    pub fn build(self) -> Result<UsageCoordinator, MeterstatError> {
        let source = self.source.ok_or_else(|| {
            MeterstatError::InvalidArg("no usage source registered; call usage_source(...)".into())
        })?;
        let store = self.store.ok_or_else(|| {
            MeterstatError::InvalidArg(
                "no checkpoint store registered; call checkpoint_store(...)".into(),
            )
        })?;
        if self.cfg.site_id.trim().is_empty() {
            return Err(MeterstatError::InvalidArg("site id must not be empty".into()));
        }
        let width = BucketWidth::from_minutes(self.cfg.bucket_minutes)?;
        let usage_prefix = statistic_prefix(&self.cfg.domain, &self.cfg.entry_title, USAGE_SUFFIX);
        let cost_prefix = statistic_prefix(&self.cfg.domain, &self.cfg.entry_title, COST_SUFFIX);

        Ok(UsageCoordinator {
            source,
            store,
            cfg: self.cfg,
            width,
            usage_prefix,
            cost_prefix,
            series_locks: Mutex::new(HashMap::new()),
            latest: RwLock::new(None),
        })
    }
}

struct SeriesPlan {
    key: SeriesKey,
    metadata: StatisticMetadata,
    buckets: Buckets,
}

struct CycleOutcome {
    appended: usize,
    latest: Option<DateTime<Utc>>,
}

impl UsageCoordinator {
    /// Start building a coordinator.
    #[must_use]
    pub fn builder() -> UsageCoordinatorBuilder {
        UsageCoordinatorBuilder::new()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    /// Newest interval start appended by any refresh of this instance.
    pub async fn latest_processed(&self) -> Option<DateTime<Utc>> {
        *self.latest.read().await
    }

    /// Refresh using today's date in the configured site timezone.
    ///
    /// # Errors
    /// See [`UsageCoordinator::refresh`].
    pub async fn refresh_now(&self) -> Result<RefreshReport, MeterstatError> {
        let today = Utc::now().with_timezone(&self.cfg.timezone).date_naive();
        self.refresh(today).await
    }

    /// Fetch `[today - lookback_days, today]`, bucket it, and append every
    /// bucket newer than each series' checkpoint.
    ///
    /// Behavior:
    /// - The fetch runs before any series lock is taken.
    /// - Series cycles (read checkpoint, accumulate, append) run concurrently;
    ///   cycles for the same series are serialized across callers.
    /// - A failing series is reported in `warnings` and leaves its checkpoint
    ///   untouched; the others still complete.
    ///
    /// # Errors
    /// - `Fetch` if the usage source fails; nothing is written.
    /// - `Data` if the fetched readings cannot be bucketed.
    /// - `SeriesFailed` if every series cycle failed.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "meterstat::coordinator::refresh",
            skip(self),
            fields(site = %self.cfg.site_id, today = %today),
        )
    )]
    pub async fn refresh(&self, today: NaiveDate) -> Result<RefreshReport, MeterstatError> {
        let start = today
            .checked_sub_days(Days::new(u64::from(self.cfg.lookback_days)))
            .ok_or_else(|| {
                MeterstatError::InvalidArg(format!(
                    "lookback of {} days from {today} is out of range",
                    self.cfg.lookback_days
                ))
            })?;

        let records = self
            .source
            .usage(&self.cfg.site_id, start, today)
            .await
            .map_err(|e| tag_fetch(self.source.name(), e))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(records = records.len(), %start, "fetched usage");

        let readings: Vec<_> = records.iter().flat_map(|r| r.readings()).collect();
        let normalized = normalize(&readings, self.width)?;
        let plans: Vec<SeriesPlan> = normalized
            .into_iter()
            .filter_map(|(key, buckets)| self.plan(key, buckets))
            .collect();

        let tasks = plans.into_iter().map(|plan| async move {
            let key = plan.key.clone();
            let res = self.run_cycle(plan).await;
            (key, res)
        });
        let joined = futures::future::join_all(tasks).await;

        let mut report = RefreshReport::default();
        let mut failures: Vec<MeterstatError> = Vec::new();
        let total = joined.len();
        for (key, res) in joined {
            match res {
                Ok(outcome) => {
                    report.appended.insert(key, outcome.appended);
                    report.latest = report.latest.max(outcome.latest);
                }
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(series = %key, error = %e, "series cycle failed");
                    failures.push(e);
                }
            }
        }

        if total > 0 && failures.len() == total {
            return Err(MeterstatError::SeriesFailed(failures));
        }
        report.warnings = failures;

        if let Some(newest) = report.latest {
            let mut latest = self.latest.write().await;
            if latest.is_none_or(|cur| cur < newest) {
                *latest = Some(newest);
            }
        }
        Ok(report)
    }

    fn plan(&self, channel: ChannelKey, buckets: Buckets) -> Option<SeriesPlan> {
        let (prefix, unit) = match channel.kind {
            ReadingKind::Usage => (&self.usage_prefix, channel.kind.unit()),
            ReadingKind::Cost => (&self.cost_prefix, channel.kind.unit()),
            _ => return None,
        };
        let metadata =
            StatisticMetadata::running_sum(prefix, &channel.channel, &self.cfg.domain, unit);
        Some(SeriesPlan {
            key: metadata.statistic_id.clone(),
            metadata,
            buckets,
        })
    }

    async fn series_lock(&self, key: &SeriesKey) -> Arc<Mutex<()>> {
        let mut locks = self.series_locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "meterstat::coordinator::cycle",
            skip(self, plan),
            fields(series = %plan.key, buckets = plan.buckets.len()),
        )
    )]
    async fn run_cycle(&self, plan: SeriesPlan) -> Result<CycleOutcome, MeterstatError> {
        let SeriesPlan {
            key,
            metadata,
            buckets,
        } = plan;
        let lock = self.series_lock(&key).await;
        let _guard = lock.lock().await;

        let checkpoint = self
            .store
            .last(&key)
            .await
            .map_err(|e| tag_persistence(&key, e))?;
        let acc = accumulate(
            &key,
            buckets.into_iter().map(Bucket::from),
            checkpoint.as_ref(),
            self.cfg.negative_deltas,
        )?;
        if acc.points.is_empty() {
            return Ok(CycleOutcome {
                appended: 0,
                latest: None,
            });
        }

        let latest = acc.latest();
        let appended = acc.points.len();
        self.store
            .append(&key, &metadata, acc.points)
            .await
            .map_err(|e| tag_persistence(&key, e))?;
        Ok(CycleOutcome { appended, latest })
    }
}

fn tag_fetch(source: &str, e: MeterstatError) -> MeterstatError {
    match e {
        e @ MeterstatError::Fetch { .. } => e,
        other => MeterstatError::fetch(source, other.to_string()),
    }
}

fn tag_persistence(series: &SeriesKey, e: MeterstatError) -> MeterstatError {
    match e {
        e @ MeterstatError::Persistence { .. } => e,
        other => MeterstatError::persistence(series.as_str(), other.to_string()),
    }
}
