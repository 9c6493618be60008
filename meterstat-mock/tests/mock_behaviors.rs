use chrono::{NaiveDate, TimeZone, Utc};
use meterstat_core::{
    Checkpoint, CheckpointStore, CumulativePoint, ExportSource, MeterstatError, SeriesKey,
    StatisticMetadata, Unit, UsageSource,
};
use meterstat_mock::{InMemoryCheckpointStore, MockBehavior, MockExportSource, MockUsageSource};

fn key() -> SeriesKey {
    SeriesKey::new("amberelectric_usages:home_usages", "E1")
}

fn meta() -> StatisticMetadata {
    StatisticMetadata::running_sum(
        "amberelectric_usages:home_usages",
        "E1",
        "meterstat",
        Unit::KilowattHour,
    )
}

fn point(hour: u32, sum: f64) -> CumulativePoint {
    CumulativePoint {
        interval_start: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        delta: 1.0,
        sum,
    }
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

#[tokio::test]
async fn queued_behaviors_play_before_fallback() {
    let source = MockExportSource::returning("fallback");
    source.push(MockBehavior::Return("first".to_string())).await;
    source
        .push(MockBehavior::Fail(MeterstatError::fetch("x", "boom")))
        .await;

    assert_eq!(source.export(d(1), d(2)).await.unwrap(), "first");
    assert!(source.export(d(1), d(2)).await.is_err());
    assert_eq!(source.export(d(3), d(4)).await.unwrap(), "fallback");
    assert_eq!(
        source.calls().await,
        vec![(d(1), d(2)), (d(1), d(2)), (d(3), d(4))]
    );
}

#[tokio::test]
async fn usage_source_records_calls() {
    let source = MockUsageSource::returning(Vec::new());
    assert!(source.usage("site", d(1), d(2)).await.unwrap().is_empty());
    let calls = source.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].site_id, "site");
    assert_eq!((calls[0].start, calls[0].end), (d(1), d(2)));
}

#[tokio::test]
async fn store_rejects_appends_that_rewrite_history() {
    let store = InMemoryCheckpointStore::new();
    store
        .append(&key(), &meta(), vec![point(1, 1.0), point(2, 2.0)])
        .await
        .unwrap();

    let err = store
        .append(&key(), &meta(), vec![point(2, 3.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, MeterstatError::Persistence { .. }));
    assert_eq!(store.points(&key()).await.len(), 2);

    let last = store.last(&key()).await.unwrap().unwrap();
    assert_eq!(last.last_sum, 2.0);
    assert_eq!(store.append_calls(), 2);
    assert_eq!(store.last_calls(), 1);
}

#[tokio::test]
async fn seeded_checkpoint_is_visible_and_guards_appends() {
    let store = InMemoryCheckpointStore::new();
    store
        .seed(Checkpoint {
            series: key(),
            last_sum: 10.0,
            last_interval_start: Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap(),
        })
        .await;

    assert_eq!(store.last(&key()).await.unwrap().unwrap().last_sum, 10.0);
    assert!(store.append(&key(), &meta(), vec![point(4, 11.0)]).await.is_err());
    store.append(&key(), &meta(), vec![point(6, 11.0)]).await.unwrap();
    assert_eq!(store.series().await, vec![key()]);
    assert_eq!(store.metadata(&key()).await, Some(meta()));
}

#[tokio::test]
async fn injected_failures_clear() {
    let store = InMemoryCheckpointStore::new();
    store.fail_reads_for(key()).await;
    store.fail_appends_for(key()).await;
    assert!(store.last(&key()).await.is_err());
    assert!(store.append(&key(), &meta(), vec![point(1, 1.0)]).await.is_err());

    store.clear_failures().await;
    assert!(store.last(&key()).await.unwrap().is_none());
    store.append(&key(), &meta(), vec![point(1, 1.0)]).await.unwrap();
}
