// Re-export helpers so tests can `use helpers::*;`
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Australia::Brisbane;
use chrono_tz::Tz;

use meterstat::{SeriesKey, UsageCoordinator};
use meterstat_mock::{InMemoryCheckpointStore, MockUsageSource};

pub const SITE: &str = "01HSITE";
pub const ENTRY_TITLE: &str = "Home-Main";
pub const NMI: &str = "3120000000";

pub const USAGE_E1: &str = "amberelectric_usages:homemain_usages_e1";
pub const COST_E1: &str = "amberelectric_usages:homemain_usage_costs_e1";
pub const USAGE_B1: &str = "amberelectric_usages:homemain_usages_b1";
pub const COST_B1: &str = "amberelectric_usages:homemain_usage_costs_b1";

pub fn key(id: &str) -> SeriesKey {
    SeriesKey::from_raw(id)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
}

pub fn aest(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(10 * 3600)
        .unwrap()
        .with_ymd_and_hms(y, m, d, hh, mm, 0)
        .unwrap()
}

pub fn brisbane(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Tz> {
    Brisbane.with_ymd_and_hms(y, m, d, hh, mm, 0).unwrap()
}

pub fn coordinator(
    source: Arc<MockUsageSource>,
    store: Arc<InMemoryCheckpointStore>,
) -> UsageCoordinator {
    UsageCoordinator::builder()
        .usage_source(source)
        .checkpoint_store(store)
        .site_id(SITE)
        .entry_title(ENTRY_TITLE)
        .build()
        .unwrap()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
