//! Builders for usage records and CSV export bodies.
pub mod export;
pub mod usage;
