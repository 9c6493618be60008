//! Interval export pipeline.
//!
//! - `parse`: staged parsing of decoded export rows into per-stream points
//! - `store`: in-memory interval cache with staleness, estimation and retention
//! - `dao`: guarded re-download and per-poll consumption deltas
pub mod dao;
pub mod parse;
pub mod store;

pub use dao::ExportDao;
pub use parse::{ParsedExport, PointMap, parse_export};
pub use store::{DailyTotal, IntervalStore};
