//! meterstat-globird
//!
//! [`ExportSource`] implementation for the customer portal's interval CSV
//! export. Authentication resolves the portal session cookie to the account
//! service that owns the requested site; each export is then a `POST` of a
//! date-range form returning the CSV body.
#![warn(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use meterstat_core::{ExportSource, MeterstatError};

/// Production portal root.
pub const DEFAULT_BASE_URL: &str = "https://myaccount.globirdenergy.com.au";

/// Name of the session cookie carrying the access token.
pub const SESSION_COOKIE: &str = "globird-portal-user";

const NAME: &str = "meterstat-globird";
const CURRENT_USER_PATH: &str = "/api/account/currentuser";
const EXPORT_PATH: &str = "/api/site/generatecsvfile";
const POWER_SERVICE: &str = "Power";
const FORM_DATE_FORMAT: &str = "%Y/%m/%d";

/// `currentuser` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    /// Portal-level success flag.
    pub success: bool,
    /// Present on success.
    #[serde(default)]
    pub data: Option<UserData>,
}

/// Payload of a successful `currentuser` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserData {
    /// Accounts visible to the session.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// One billing account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    /// Services (power, gas, ...) attached to the account.
    #[serde(default)]
    pub services: Vec<Service>,
}

/// One service attached to an account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service kind, `"Power"` for electricity.
    #[serde(default)]
    pub service_type: Option<String>,
    /// Meter identifier of the site (NMI).
    #[serde(default)]
    pub site_identifier: Option<String>,
    /// Id used to request exports.
    pub account_service_id: i64,
}

/// Id of the electricity service for `site_id`, if any account has one.
#[must_use]
pub fn find_power_service_id(accounts: &[Account], site_id: &str) -> Option<i64> {
    accounts
        .iter()
        .flat_map(|a| a.services.iter())
        .find(|s| {
            s.service_type.as_deref() == Some(POWER_SERVICE)
                && s.site_identifier.as_deref() == Some(site_id)
        })
        .map(|s| s.account_service_id)
}

/// Body of an export request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchForm {
    /// First day, `YYYY/MM/DD`.
    pub from_date: String,
    /// Last day, `YYYY/MM/DD`.
    pub to_date: String,
    /// Site identifier.
    pub identifier: String,
    /// Always `true`: request smart-meter interval data.
    pub is_smart: bool,
    /// Always `false`.
    pub is_cross_account: bool,
}

impl FetchForm {
    /// Form for `site_id` covering `from..=to`.
    #[must_use]
    pub fn new(site_id: &str, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from_date: from.format(FORM_DATE_FORMAT).to_string(),
            to_date: to.format(FORM_DATE_FORMAT).to_string(),
            identifier: site_id.to_string(),
            is_smart: true,
            is_cross_account: false,
        }
    }
}

fn fetch_err(e: impl std::fmt::Display) -> MeterstatError {
    MeterstatError::fetch(NAME, e.to_string())
}

/// Authenticated portal session bound to one site.
#[derive(Debug, Clone)]
pub struct GlobirdClient {
    client: reqwest::Client,
    base_url: String,
    site_id: String,
    service_id: i64,
}

impl GlobirdClient {
    /// Authenticate against the production portal.
    ///
    /// # Errors
    /// See [`GlobirdClient::authenticate_at`].
    pub async fn authenticate(token: &str, site_id: &str) -> Result<Self, MeterstatError> {
        Self::authenticate_at(DEFAULT_BASE_URL, token, site_id).await
    }

    /// Authenticate against a portal rooted at `base_url`.
    ///
    /// # Errors
    /// - `InvalidArg` if the token cannot be sent as a cookie.
    /// - `Fetch` if the portal rejects the session or answers with an
    ///   unexpected payload.
    /// - `NotFound` if no account has an electricity service for `site_id`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "meterstat_globird::authenticate", skip(base_url, token))
    )]
    pub async fn authenticate_at(
        base_url: &str,
        token: &str,
        site_id: &str,
    ) -> Result<Self, MeterstatError> {
        let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).map_err(|_| {
            MeterstatError::InvalidArg("access token is not a valid cookie value".into())
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| MeterstatError::Other(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client
            .get(format!("{base_url}{CURRENT_USER_PATH}"))
            .send()
            .await
            .map_err(fetch_err)?;
        let status = response.status();
        let body = response.text().await.map_err(fetch_err)?;
        if status != StatusCode::OK {
            return Err(fetch_err(format!(
                "failed to get user info: HTTP {status}: {}",
                body.trim()
            )));
        }
        let user: CurrentUser = serde_json::from_str(&body)
            .map_err(|e| fetch_err(format!("invalid user info payload: {e}")))?;
        if !user.success {
            return Err(fetch_err(format!("failed to get user info: {}", body.trim())));
        }

        let accounts = user.data.map(|d| d.accounts).unwrap_or_default();
        let service_id = find_power_service_id(&accounts, site_id).ok_or_else(|| {
            MeterstatError::not_found(format!("electricity service for site {site_id}"))
        })?;
        #[cfg(feature = "tracing")]
        tracing::debug!(service_id, "resolved electricity service");

        Ok(Self {
            client,
            base_url,
            site_id: site_id.to_string(),
            service_id,
        })
    }

    /// Account service id used for exports.
    #[must_use]
    pub const fn service_id(&self) -> i64 {
        self.service_id
    }

    /// Site the session is bound to.
    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }
}

#[async_trait]
impl ExportSource for GlobirdClient {
    fn name(&self) -> &'static str {
        NAME
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "meterstat_globird::export",
            skip(self),
            fields(service = self.service_id, from = %from, to = %to),
        )
    )]
    async fn export(&self, from: NaiveDate, to: NaiveDate) -> Result<String, MeterstatError> {
        let form = FetchForm::new(&self.site_id, from, to);
        let response = self
            .client
            .post(format!("{}{EXPORT_PATH}", self.base_url))
            .query(&[("accountServiceId", self.service_id)])
            .json(&form)
            .send()
            .await
            .map_err(fetch_err)?;
        let status = response.status();
        let body = response.text().await.map_err(fetch_err)?;
        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::warn!(%status, "export request rejected");
            return Err(fetch_err(format!("export failed: HTTP {status}: {}", body.trim())));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = body.len(), "downloaded export");
        Ok(body)
    }
}
