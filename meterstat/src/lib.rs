//! Meterstat merges electricity usage feeds into cumulative statistics.
//!
//! Overview
//! - [`UsageCoordinator`] pulls hourly usage and cost from a
//!   [`UsageSource`](meterstat_core::UsageSource), buckets it per channel, and appends
//!   running sums to a [`CheckpointStore`](meterstat_core::CheckpointStore). Each
//!   bucket is written once: buckets at or before a series' checkpoint are
//!   skipped, so overlapping fetch windows and restarts are harmless.
//! - [`ExportDao`] keeps an [`IntervalStore`] of 5-minute consumption and
//!   feed-in readings from a CSV [`ExportSource`](meterstat_core::ExportSource),
//!   re-downloads when the data goes stale, fills gaps by estimation, and
//!   reports consumption deltas between polls.
//!
//! Key behaviors
//! - Series cycles are serialized per series and run concurrently across series.
//! - A failed fetch leaves checkpoints and the store untouched and surfaces a
//!   recoverable `Fetch` error; there is no internal retry.
//! - Partial failures travel in report `warnings` instead of aborting a refresh.
//!
//! Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use meterstat::UsageCoordinator;
//!
//! let coordinator = UsageCoordinator::builder()
//!     .usage_source(Arc::new(amber))
//!     .checkpoint_store(Arc::new(recorder))
//!     .site_id("01F5A5CRKMZ5BCX9P1S4V990AM")
//!     .entry_title("Home")
//!     .build()?;
//! let report = coordinator.refresh_now().await?;
//! println!("appended {} points", report.total_appended());
//! ```
#![warn(missing_docs)]

mod coordinator;
pub mod portal;

pub use coordinator::{UsageCoordinator, UsageCoordinatorBuilder};
pub use portal::{DailyTotal, ExportDao, IntervalStore, ParsedExport, parse_export};

pub use meterstat_core::{
    CoordinatorConfig, Estimate, Estimator, MergeReport, MeterstatError, NegativeDeltas,
    PortalConfig, RefreshReport, SeriesKey, StreamKind, TrailingAverageEstimator,
};
