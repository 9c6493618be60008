use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{Checkpoint, CumulativePoint, SeriesKey, StatisticMetadata, UsageRecord};
use crate::MeterstatError;

/// Role trait for upstreams that return interval usage records for a site.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// A stable identifier used in error messages and logs (e.g. "meterstat-amber").
    fn name(&self) -> &'static str;

    /// Fetch usage records for `site_id` between `start` and `end` (inclusive dates).
    async fn usage(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>, MeterstatError>;
}

/// Role trait for upstreams that export interval data as a CSV body.
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// A stable identifier used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Fetch the raw export body covering `from..=to`.
    ///
    /// The body may start with a UTF-8 byte order mark; see
    /// [`decode_export`](crate::export::decode_export).
    async fn export(&self, from: NaiveDate, to: NaiveDate) -> Result<String, MeterstatError>;
}

/// Role trait for the external statistics engine that owns checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest persisted point of `series`, or `None` when nothing was written yet.
    async fn last(&self, series: &SeriesKey) -> Result<Option<Checkpoint>, MeterstatError>;

    /// Append points (ascending, all newer than the current checkpoint) to `series`.
    async fn append(
        &self,
        series: &SeriesKey,
        metadata: &StatisticMetadata,
        points: Vec<CumulativePoint>,
    ) -> Result<(), MeterstatError>;
}

/// Synchronous usage client, for SDKs that only offer blocking calls.
pub trait BlockingUsageClient: Send + Sync + 'static {
    /// Stable identifier of the client.
    fn name(&self) -> &'static str;

    /// Blocking fetch of usage records.
    fn usage(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>, MeterstatError>;
}

/// Adapter running a [`BlockingUsageClient`] on Tokio's blocking pool so the
/// slow call never stalls the scheduler thread.
pub struct OffThread<C> {
    inner: Arc<C>,
}

impl<C: BlockingUsageClient> OffThread<C> {
    /// Wrap a blocking client.
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }
}

#[async_trait]
impl<C: BlockingUsageClient> UsageSource for OffThread<C> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn usage(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>, MeterstatError> {
        let inner = Arc::clone(&self.inner);
        let site = site_id.to_string();
        let name = inner.name();
        tokio::task::spawn_blocking(move || inner.usage(&site, start, end))
            .await
            .map_err(|e| MeterstatError::fetch(name, format!("blocking task failed: {e}")))?
    }
}
