//! meterstat-core
//!
//! Core types, traits, and utilities shared across the meterstat workspace.
//!
//! - `types`: readings, buckets, checkpoints, cumulative points, export data points.
//! - `connector`: the `UsageSource`, `ExportSource` and `CheckpointStore` role traits.
//! - `timeseries`: bucketing of readings and checkpoint-resuming accumulation.
//! - `estimate`: gap estimation for interval series.
//! - `export`: decoding of raw export bodies into rows.
//!
//! Async runtime (Tokio)
//! ---------------------
//! The role traits are runtime-agnostic, but [`connector::OffThread`] moves
//! blocking clients onto `tokio::task::spawn_blocking` and therefore needs a
//! Tokio 1.x runtime.
#![warn(missing_docs)]

/// Source and persistence role traits.
pub mod connector;
/// Gap estimation.
pub mod estimate;
/// Export body decoding.
pub mod export;
/// Time-series bucketing and accumulation.
pub mod timeseries;
pub mod types;

pub use connector::{BlockingUsageClient, CheckpointStore, ExportSource, OffThread, UsageSource};
pub use estimate::{Estimate, Estimator, Lookup, TrailingAverageEstimator};
pub use export::decode_export;
pub use timeseries::accumulate::{Accumulation, accumulate};
pub use timeseries::bucket::{BucketWidth, Buckets, ChannelKey, normalize};
pub use types::*;
