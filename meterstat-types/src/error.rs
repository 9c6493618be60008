use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the meterstat workspace.
///
/// Covers upstream fetch failures, export parse failures, checkpoint
/// persistence failures, and an aggregate for multi-series update cycles.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MeterstatError {
    /// The upstream source (usage API or export portal) failed.
    #[error("{source_name} fetch failed: {msg}")]
    Fetch {
        /// Source name that failed (e.g. "meterstat-amber").
        source_name: String,
        /// Human-readable error message.
        msg: String,
    },

    /// An export batch could not be parsed; nothing from the batch was applied.
    #[error("parse error (row {line:?}): {msg}")]
    Parse {
        /// Zero-based row index of the offending row, when known.
        line: Option<usize>,
        /// Human-readable error message.
        msg: String,
    },

    /// Reading or writing the checkpoint of one series failed.
    #[error("persistence failed for {series}: {msg}")]
    Persistence {
        /// Series key whose checkpoint operation failed.
        series: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Issues with the supplied or returned data (duplicate buckets, negative deltas, etc.).
    #[error("data issue: {0}")]
    Data(String),

    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "power service for site X".
        what: String,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),

    /// One or more series failed during an update cycle; contains the individual failures.
    #[error("series failed: {0:?}")]
    SeriesFailed(Vec<MeterstatError>),
}

impl MeterstatError {
    /// Helper: build a `Fetch` error with the source name and message.
    pub fn fetch(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Parse` error, optionally tagged with the row index.
    pub fn parse(line: Option<usize>, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            msg: msg.into(),
        }
    }

    /// Helper: build a `Persistence` error for a series key.
    pub fn persistence(series: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            series: series.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Returns true if the next scheduled cycle may succeed without intervention.
    ///
    /// Transport and persistence failures are transient; malformed data and
    /// invalid arguments will fail the same way again.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Persistence { .. } => true,
            Self::SeriesFailed(inner) => inner.iter().all(Self::is_recoverable),
            _ => false,
        }
    }

    /// Flatten nested `SeriesFailed` structures into a plain vector.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::SeriesFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
