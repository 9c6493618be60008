//! meterstat-amber
//!
//! [`UsageSource`] implementation for the retail usage API: one `GET
//! /sites/{site}/usage` per refresh, authenticated with a bearer token,
//! decoded into [`UsageRecord`]s.
#![warn(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use meterstat_core::{MeterstatError, UsageRecord, UsageSource};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.amber.com.au/v1";

const NAME: &str = "meterstat-amber";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One usage interval as returned by the API. Fields not needed for
/// statistics (tariff, quality, renewables, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsage {
    channel_identifier: String,
    start_time: DateTime<FixedOffset>,
    kwh: f64,
    cost: f64,
}

impl From<WireUsage> for UsageRecord {
    fn from(w: WireUsage) -> Self {
        Self {
            channel_identifier: w.channel_identifier,
            start_time: w.start_time,
            kwh: w.kwh,
            cost: w.cost,
        }
    }
}

/// Decode a usage response body.
///
/// # Errors
/// Returns `Fetch` if the body is not a JSON array of usage intervals.
pub fn decode_usage(body: &str) -> Result<Vec<UsageRecord>, MeterstatError> {
    let wire: Vec<WireUsage> = serde_json::from_str(body)
        .map_err(|e| MeterstatError::fetch(NAME, format!("invalid usage payload: {e}")))?;
    Ok(wire.into_iter().map(UsageRecord::from).collect())
}

/// Usage source backed by the retail usage API.
#[derive(Clone)]
pub struct AmberUsageSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AmberUsageSource {
    /// Source for the production API.
    ///
    /// # Errors
    /// Returns `Other` if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> Result<Self, MeterstatError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    /// Source for an API rooted at `base_url` (no trailing slash needed).
    ///
    /// # Errors
    /// Returns `Other` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, MeterstatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MeterstatError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn usage_url(&self, site_id: &str) -> String {
        format!("{}/sites/{site_id}/usage", self.base_url)
    }
}

#[async_trait]
impl UsageSource for AmberUsageSource {
    fn name(&self) -> &'static str {
        NAME
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "meterstat_amber::usage",
            skip(self),
            fields(site = site_id, start = %start, end = %end),
        )
    )]
    async fn usage(
        &self,
        site_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<UsageRecord>, MeterstatError> {
        let response = self
            .client
            .get(self.usage_url(site_id))
            .bearer_auth(&self.token)
            .query(&[
                ("startDate", start.format(DATE_FORMAT).to_string()),
                ("endDate", end.format(DATE_FORMAT).to_string()),
            ])
            .send()
            .await
            .map_err(|e| MeterstatError::fetch(NAME, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MeterstatError::fetch(NAME, e.to_string()))?;
        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(%status, "usage request rejected");
            return Err(MeterstatError::fetch(
                NAME,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }

        let records = decode_usage(&body)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(records = records.len(), "decoded usage");
        Ok(records)
    }
}
