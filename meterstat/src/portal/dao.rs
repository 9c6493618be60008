//! Guarded re-download and per-poll deltas over an interval store.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, RwLock};

use meterstat_core::{ExportSource, MergeReport, MeterstatError, PortalConfig, decode_export};

use super::store::IntervalStore;

#[derive(Debug, Clone, Copy)]
struct LastRead {
    date: NaiveDate,
    at: DateTime<Utc>,
    value: f64,
}

/// Polling front of an [`IntervalStore`]: re-downloads the export when the
/// store goes stale and turns the day's running total into per-poll deltas.
pub struct ExportDao {
    source: Arc<dyn ExportSource>,
    store: RwLock<IntervalStore>,
    download_guard: Mutex<()>,
    last_read: Mutex<Option<LastRead>>,
    fetch_range_days: u32,
}

impl ExportDao {
    /// DAO over a fresh store configured from `cfg`.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the configured interval width is invalid.
    pub fn new(source: Arc<dyn ExportSource>, cfg: &PortalConfig) -> Result<Self, MeterstatError> {
        let store = IntervalStore::new(cfg)?;
        Ok(Self::with_store(source, store, cfg.fetch_range_days))
    }

    /// DAO over an existing store.
    #[must_use]
    pub fn with_store(
        source: Arc<dyn ExportSource>,
        store: IntervalStore,
        fetch_range_days: u32,
    ) -> Self {
        Self {
            source,
            store: RwLock::new(store),
            download_guard: Mutex::new(()),
            last_read: Mutex::new(None),
            fetch_range_days,
        }
    }

    /// Run `f` against the store under its read lock.
    pub async fn with_store_ref<R>(&self, f: impl FnOnce(&IntervalStore) -> R) -> R {
        let store = self.store.read().await;
        f(&store)
    }

    /// Date window requested from the export source for a download at `now`:
    /// `[today - fetch_range_days, today]` in the store's timezone.
    pub async fn fetch_window(&self, now: DateTime<Tz>) -> (NaiveDate, NaiveDate) {
        let tz = self.store.read().await.timezone();
        let to = now.with_timezone(&tz).date_naive();
        let from = to
            .checked_sub_days(Days::new(u64::from(self.fetch_range_days)))
            .unwrap_or(NaiveDate::MIN);
        (from, to)
    }

    /// Consumption since the previous call on the same local date.
    ///
    /// Behavior:
    /// - Downloads first when the store is stale.
    /// - Reads the running total for `now`'s local day.
    /// - The first call on a new date returns the full total so far; later
    ///   calls the same day return the increase over the previous call.
    /// - A call whose `now` is not newer than the previous one on the same
    ///   date returns `0.0` and leaves the baseline in place.
    ///
    /// # Errors
    /// Propagates download failures (`Fetch`, `Parse`); the previous reading
    /// is kept so the next successful call still reports the full delta.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "meterstat::portal::fetch", skip(self), fields(now = %now))
    )]
    pub async fn fetch(&self, now: DateTime<Tz>) -> Result<f64, MeterstatError> {
        self.download_if_stale(now).await?;

        // Held across the read so the baseline moves in the same order as the reads.
        let mut last = self.last_read.lock().await;
        let (today, read) = {
            let store = self.store.read().await;
            let today = now.with_timezone(&store.timezone()).date_naive();
            (today, store.total_daily_consumption(now))
        };

        let at = now.with_timezone(&Utc);
        let delta = match *last {
            Some(prev) if prev.date == today && at <= prev.at => {
                #[cfg(feature = "tracing")]
                tracing::debug!(previous = %prev.at, "poll not newer than baseline");
                return Ok(0.0);
            }
            Some(prev) if prev.date == today => read - prev.value,
            _ => read,
        };
        *last = Some(LastRead {
            date: today,
            at,
            value: read,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(read, delta, "daily consumption read");
        Ok(delta)
    }

    /// Download and merge the export if the store is stale at `now`.
    ///
    /// Concurrent callers serialize on a download guard and re-check
    /// staleness after acquiring it, so one stale period triggers at most one
    /// download. The network call holds no store lock; the write lock is held
    /// only while applying the parsed batch.
    ///
    /// Returns `Ok(None)` when no download was needed.
    ///
    /// # Errors
    /// - `Fetch` if the export source fails.
    /// - `Parse` if the body is malformed; the store is left untouched.
    pub async fn download_if_stale(
        &self,
        now: DateTime<Tz>,
    ) -> Result<Option<MergeReport>, MeterstatError> {
        if !self.store.read().await.is_stale(now) {
            return Ok(None);
        }

        let _guard = self.download_guard.lock().await;
        if !self.store.read().await.is_stale(now) {
            return Ok(None);
        }

        let (from, to) = self.fetch_window(now).await;
        let name = self.source.name();
        let body = self.source.export(from, to).await.map_err(|e| match e {
            e @ MeterstatError::Fetch { .. } => e,
            other => MeterstatError::fetch(name, other.to_string()),
        })?;
        let rows = decode_export(&body)?;

        let report = self.store.write().await.merge_data(&rows).inspect_err(|_e| {
            #[cfg(feature = "tracing")]
            tracing::warn!(source = name, error = %_e, "rejected export batch");
        })?;

        #[cfg(feature = "tracing")]
        for w in &report.warnings {
            tracing::warn!(source = name, warning = %w, "export merge warning");
        }
        Ok(Some(report))
    }
}
