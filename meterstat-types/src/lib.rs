//! Meterstat error, configuration, series identity, and report types.
#![warn(missing_docs)]

mod config;
mod error;
mod reports;
mod series;

pub use config::{CoordinatorConfig, NegativeDeltas, PortalConfig};
pub use error::MeterstatError;
pub use reports::{MergeReport, RefreshReport};
pub use series::{SeriesKey, StatisticMetadata, Unit, statistic_prefix};
