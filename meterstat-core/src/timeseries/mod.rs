//! Time-series utilities shared by the coordinator and the interval store.
//!
//! Modules include:
//! - `bucket`: truncate aware timestamps and group readings into fixed-width buckets
//! - `accumulate`: turn buckets into running-sum points resuming after a checkpoint
/// Checkpoint-resuming running-sum accumulation.
pub mod accumulate;
/// Bucket widths and reading normalization.
pub mod bucket;
