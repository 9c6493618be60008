mod helpers;

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, TimeZone};
use chrono_tz::Australia::Sydney;
use chrono_tz::Tz;
use helpers::*;
use meterstat::portal::parse_export;
use meterstat::{Estimate, Estimator, IntervalStore, MeterstatError, PortalConfig, StreamKind};
use meterstat_core::{BucketWidth, decode_export};
use meterstat_mock::fixtures::export::ExportBuilder;
use proptest::prelude::*;

fn store() -> IntervalStore {
    IntervalStore::new(&PortalConfig::default()).unwrap()
}

fn rows(body: &str) -> Vec<Vec<String>> {
    decode_export(body).unwrap()
}

/// Slot index of `hh:mm` in a five-minute day.
const fn slot(hh: usize, mm: usize) -> usize {
    hh * 12 + mm / 5
}

#[test]
fn staleness_follows_latest_date() {
    let mut s = store();
    assert!(s.is_stale(brisbane(2024, 5, 20, 9, 0)));

    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 5, 20), 0.5)
        .build();
    s.merge_data(&rows(&body)).unwrap();
    assert_eq!(s.latest_date(), Some(date(2024, 5, 20)));

    assert!(!s.is_stale(brisbane(2024, 5, 20, 9, 0)));
    assert!(!s.is_stale(brisbane(2024, 5, 21, 23, 55)));
    assert!(s.is_stale(brisbane(2024, 5, 22, 0, 0)));
    assert!(s.is_stale(brisbane(2024, 5, 25, 12, 0)));
}

#[test]
fn daily_total_sums_actuals_through_until() {
    let mut s = store();
    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .day(date(2024, 5, 20), |i| (i < 12).then_some(1.0))
        .build();
    s.merge_data(&rows(&body)).unwrap();

    let until = brisbane(2024, 5, 20, 0, 55);
    assert_eq!(s.total_daily_consumption(until), 12.0);
    let detail = s.daily_total(StreamKind::Consumption, until);
    assert_eq!(detail.actual_steps, 12);
    assert_eq!(detail.estimated_steps, 0);
    assert_eq!(detail.unavailable_steps, 0);

    // Mid-interval `until` still counts the interval it falls in.
    assert_eq!(s.total_daily_consumption(brisbane(2024, 5, 20, 0, 3)), 1.0);
}

#[test]
fn gaps_are_filled_from_prior_days() {
    let mut s = store();
    let today = date(2024, 5, 20);
    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .day(today.checked_sub_days(Days::new(7)).unwrap(), |i| {
            (i == slot(0, 30)).then_some(6.0)
        })
        .day(today.checked_sub_days(Days::new(3)).unwrap(), |i| {
            (i == slot(0, 30)).then_some(4.0)
        })
        .build();
    s.merge_data(&rows(&body)).unwrap();

    let at = brisbane(2024, 5, 20, 0, 30);
    assert_eq!(s.actual(StreamKind::Consumption, at), None);
    assert_eq!(s.estimated(StreamKind::Consumption, at), Estimate::Value(5.0));

    let detail = s.daily_total(StreamKind::Consumption, at);
    assert_eq!(detail.total, 5.0);
    assert_eq!(detail.estimated_steps, 1);
    assert_eq!(detail.unavailable_steps, 6);

    assert_eq!(
        s.estimated(StreamKind::FeedIn, at),
        Estimate::Unavailable,
        "feed-in has no samples"
    );
}

#[test]
fn empty_store_totals_zero() {
    let s = store();
    let detail = s.daily_total(StreamKind::Consumption, brisbane(2024, 5, 20, 1, 0));
    assert_eq!(detail.total, 0.0);
    assert_eq!(detail.unavailable_steps, 13);
}

#[test]
fn streams_land_in_their_own_maps() {
    let mut s = store();
    let body = ExportBuilder::new(NMI)
        .with_bom()
        .stream("E1")
        .constant_day(date(2024, 5, 20), 0.25)
        .total(72.0)
        .stream("B1")
        .day(date(2024, 5, 20), |i| (i == slot(12, 0)).then_some(0.75))
        .build();
    let report = s.merge_data(&rows(&body)).unwrap();
    assert_eq!(report.consumption, 288);
    assert_eq!(report.feed_in, 1);
    assert_eq!(report.skipped_rows, 0);
    assert!(report.warnings.is_empty());

    let noon = brisbane(2024, 5, 20, 12, 0);
    assert_eq!(s.actual(StreamKind::FeedIn, noon), Some(0.75));
    assert_eq!(s.actual(StreamKind::Consumption, noon), Some(0.25));
    let feed_in = s.daily_total(StreamKind::FeedIn, noon);
    assert_eq!(feed_in.total, 0.75);
    assert_eq!(feed_in.actual_steps, 1);
}

#[test]
fn unknown_streams_are_skipped_not_misfiled() {
    let mut s = store();
    let body = ExportBuilder::new(NMI)
        .stream("Q1")
        .constant_day(date(2024, 5, 20), 9.0)
        .constant_day(date(2024, 5, 21), 9.0)
        .stream("E1")
        .constant_day(date(2024, 5, 19), 0.5)
        .build();
    let report = s.merge_data(&rows(&body)).unwrap();
    assert_eq!(report.skipped_rows, 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.consumption, 288);
    assert_eq!(report.latest_date, Some(date(2024, 5, 19)));
    assert_eq!(s.len(StreamKind::FeedIn), 0);
}

#[test]
fn rows_before_any_stream_are_skipped() {
    let mut s = store();
    let body = format!("Nmi,{NMI}\r\n20240520,1.0\r\n");
    let report = s.merge_data(&rows(&body)).unwrap();
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(s.is_empty());
    assert_eq!(s.latest_date(), None);
}

#[test]
fn malformed_batch_leaves_store_untouched() {
    let mut s = store();
    let good = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 5, 19), 0.5)
        .build();
    s.merge_data(&rows(&good)).unwrap();

    let bad_value = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 5, 20), 1.0)
        .day(date(2024, 5, 21), |_| Some(2.0))
        .raw("20240522,abc")
        .build();
    let err = s.merge_data(&rows(&bad_value)).unwrap_err();
    assert!(matches!(err, MeterstatError::Parse { line: Some(_), .. }));
    assert_eq!(s.latest_date(), Some(date(2024, 5, 19)));
    assert_eq!(s.len(StreamKind::Consumption), 288);
    assert_eq!(s.actual(StreamKind::Consumption, brisbane(2024, 5, 20, 1, 0)), None);

    let bad_date = ExportBuilder::new(NMI).stream("E1").raw("2024-05-20,1.0").build();
    assert!(matches!(
        s.merge_data(&rows(&bad_date)),
        Err(MeterstatError::Parse { .. })
    ));

    let bad_header = format!("Stream ID,{NMI},E1\r\nDate/Time,00:00,0x:05\r\n");
    assert!(matches!(
        s.merge_data(&rows(&bad_header)),
        Err(MeterstatError::Parse { line: Some(1), .. })
    ));

    let too_wide = format!("Stream ID,{NMI},E1\r\nDate/Time,00:00,00:05\r\n20240520,1,2,3\r\n");
    assert!(matches!(
        s.merge_data(&rows(&too_wide)),
        Err(MeterstatError::Parse { line: Some(2), .. })
    ));

    let misaligned = format!("Stream ID,{NMI},E1\r\nDate/Time,00:00,00:03\r\n");
    assert!(matches!(
        s.merge_data(&rows(&misaligned)),
        Err(MeterstatError::Parse { .. })
    ));
    assert_eq!(s.len(StreamKind::Consumption), 288);
}

#[test]
fn empty_cells_are_missing_values() {
    let mut s = store();
    let body =
        format!("Stream ID,{NMI},E1\r\nDate/Time,00:00,00:05,00:10\r\n20240520,1.5,,2.5\r\n");
    let report = s.merge_data(&rows(&body)).unwrap();
    assert_eq!(report.consumption, 2);
    assert_eq!(s.actual(StreamKind::Consumption, brisbane(2024, 5, 20, 0, 5)), None);

    // A row of only empty cells stores nothing and does not move the latest date.
    let blank = format!("Stream ID,{NMI},E1\r\nDate/Time,00:00,00:05\r\n20240530,,\r\n");
    s.merge_data(&rows(&blank)).unwrap();
    assert_eq!(s.latest_date(), Some(date(2024, 5, 20)));
}

#[test]
fn later_batches_overwrite_and_latest_only_advances() {
    let mut s = store();
    let newer = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 5, 20), 0.5)
        .build();
    s.merge_data(&rows(&newer)).unwrap();

    let older_and_corrected = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 5, 18), 0.1)
        .day(date(2024, 5, 20), |i| (i == 0).then_some(3.0))
        .build();
    let report = s.merge_data(&rows(&older_and_corrected)).unwrap();
    assert_eq!(report.latest_date, Some(date(2024, 5, 20)));
    assert_eq!(s.latest_date(), Some(date(2024, 5, 20)));
    assert_eq!(
        s.actual(StreamKind::Consumption, brisbane(2024, 5, 20, 0, 0)),
        Some(3.0)
    );
    assert_eq!(
        s.actual(StreamKind::Consumption, brisbane(2024, 5, 20, 0, 5)),
        Some(0.5)
    );
}

#[test]
fn retention_evicts_old_days() {
    let mut s = store();
    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 3, 1), 0.5)
        .constant_day(date(2024, 3, 21), 0.5)
        .constant_day(date(2024, 5, 20), 0.5)
        .build();
    let report = s.merge_data(&rows(&body)).unwrap();
    // 2024-03-21 is exactly 60 days before 2024-05-20 and is kept.
    assert_eq!(report.evicted, 288);
    assert_eq!(s.len(StreamKind::Consumption), 2 * 288);
    assert_eq!(s.actual(StreamKind::Consumption, brisbane(2024, 3, 1, 0, 0)), None);
    assert_eq!(
        s.actual(StreamKind::Consumption, brisbane(2024, 3, 21, 0, 0)),
        Some(0.5)
    );
}

#[derive(Debug)]
struct Fixed(f64);

impl Estimator for Fixed {
    fn estimate(&self, _at: DateTime<Tz>, _lookup: &meterstat_core::Lookup<'_>) -> Estimate {
        Estimate::Value(self.0)
    }
}

#[test]
fn estimator_can_be_replaced() {
    let s = store().with_estimator(Arc::new(Fixed(0.5)));
    let detail = s.daily_total(StreamKind::Consumption, brisbane(2024, 5, 20, 0, 55));
    assert_eq!(detail.total, 6.0);
    assert_eq!(detail.estimated_steps, 12);
}

#[test]
fn nonexistent_local_times_are_skipped() {
    // Sydney skips 02:00-03:00 on 2024-10-06.
    let body = "Stream ID,X,E1\r\nDate/Time,01:55,02:00,02:05,03:00\r\n20241006,1,2,3,4\r\n";
    let parsed = parse_export(
        &rows(body),
        Sydney,
        BucketWidth::FIVE_MINUTES,
    )
    .unwrap();
    assert_eq!(parsed.consumption.len(), 2);
    assert_eq!(parsed.warnings.len(), 2);
    let times: Vec<NaiveTime> = parsed.consumption.values().map(|p| p.time).collect();
    assert_eq!(
        times,
        vec![
            NaiveTime::from_hms_opt(1, 55, 0).unwrap(),
            NaiveTime::from_hms_opt(3, 0, 0).unwrap()
        ]
    );
}

#[test]
fn repeated_fall_back_hour_is_counted_once() {
    // Sydney repeats 02:00-03:00 on 2024-04-07.
    let cfg = PortalConfig {
        timezone: Sydney,
        ..PortalConfig::default()
    };
    let mut s = IntervalStore::new(&cfg).unwrap();
    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 4, 6), 0.5)
        .constant_day(date(2024, 4, 7), 0.5)
        .build();
    let report = s.merge_data(&rows(&body)).unwrap();
    assert!(report.warnings.is_empty());

    let until = Sydney.with_ymd_and_hms(2024, 4, 7, 23, 55, 0).unwrap();
    let detail = s.daily_total(StreamKind::Consumption, until);
    assert_eq!(detail.actual_steps, 288);
    assert_eq!(detail.estimated_steps, 0);
    assert_eq!(detail.unavailable_steps, 0);
    assert!(approx(detail.total, 144.0));
}

#[test]
fn skipped_spring_forward_hour_is_not_counted() {
    // Sydney skips 02:00-03:00 on 2024-10-06.
    let cfg = PortalConfig {
        timezone: Sydney,
        ..PortalConfig::default()
    };
    let mut s = IntervalStore::new(&cfg).unwrap();
    let body = ExportBuilder::new(NMI)
        .stream("E1")
        .constant_day(date(2024, 10, 6), 0.5)
        .build();
    s.merge_data(&rows(&body)).unwrap();

    let until = Sydney.with_ymd_and_hms(2024, 10, 6, 23, 55, 0).unwrap();
    let detail = s.daily_total(StreamKind::Consumption, until);
    assert_eq!(detail.actual_steps, 276);
    assert_eq!(detail.unavailable_steps, 0);
    assert!(approx(detail.total, 138.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn full_day_total_matches_sum_of_actuals(values in proptest::collection::vec(0u32..1000, 288)) {
        let mut s = store();
        let values: Vec<f64> = values.into_iter().map(|v| f64::from(v) / 8.0).collect();
        let body = ExportBuilder::new(NMI)
            .stream("E1")
            .day(date(2024, 5, 20), |i| Some(values[i]))
            .build();
        s.merge_data(&rows(&body)).unwrap();
        let total = s.total_daily_consumption(brisbane(2024, 5, 20, 23, 59));
        let expected: f64 = values.iter().sum();
        prop_assert!((total - expected).abs() < 1e-6);
    }
}
