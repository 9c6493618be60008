//! Series identity and statistic metadata shared across crates.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of one cumulative statistic series.
///
/// Keys have the shape `{prefix}_{channel}` with the channel lower-cased so
/// that the same upstream channel maps to the same series across runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Build a key from a statistic prefix and a channel identifier.
    #[must_use]
    pub fn new(prefix: &str, channel: &str) -> Self {
        Self(format!("{prefix}_{}", channel.to_lowercase()))
    }

    /// Wrap an already-formed statistic id without normalization.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SeriesKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build a statistic id prefix: `{domain}:{title}_{suffix}`.
///
/// The entry title is lower-cased and stripped of `-` so renamed or
/// re-cased entries keep writing into the same statistics.
#[must_use]
pub fn statistic_prefix(domain: &str, entry_title: &str, suffix: &str) -> String {
    let title: String = entry_title.to_lowercase().replace('-', "");
    format!("{domain}:{title}_{suffix}")
}

/// Unit of measurement carried by a statistic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Unit {
    /// Energy in kilowatt-hours.
    KilowattHour,
    /// Money in dollars.
    Dollar,
}

impl Unit {
    /// Unit string as understood by the statistics engine.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::KilowattHour => "kWh",
            Self::Dollar => "$",
        }
    }
}

/// Metadata written alongside every batch of cumulative points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticMetadata {
    /// Series the points belong to.
    pub statistic_id: SeriesKey,
    /// Human-readable name, `"{prefix} - {channel}"`.
    pub name: String,
    /// Integration that produced the statistic.
    pub source: String,
    /// Unit of the delta and sum values.
    pub unit: Unit,
    /// Whether the series carries a running sum (always true here).
    pub has_sum: bool,
    /// Whether the series carries a mean (always false here).
    pub has_mean: bool,
}

impl StatisticMetadata {
    /// Metadata for a running-sum series built from a prefix and channel.
    #[must_use]
    pub fn running_sum(prefix: &str, channel: &str, source: &str, unit: Unit) -> Self {
        Self {
            statistic_id: SeriesKey::new(prefix, channel),
            name: format!("{prefix} - {channel}"),
            source: source.to_string(),
            unit,
            has_sum: true,
            has_mean: false,
        }
    }
}
