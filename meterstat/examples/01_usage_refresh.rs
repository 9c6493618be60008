use std::sync::Arc;

use chrono::{Days, Utc};
use meterstat::UsageCoordinator;
use meterstat_mock::fixtures::usage::{aest, half_hourly_day};
use meterstat_mock::{InMemoryCheckpointStore, MockUsageSource};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Log spans and events; set RUST_LOG=meterstat=debug for more detail.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Two days of scripted half-hourly usage, ending yesterday.
    let today = Utc::now().with_timezone(&chrono_tz::Australia::Sydney).date_naive();
    let mut records = Vec::new();
    for back in [2, 1] {
        let day = today.checked_sub_days(Days::new(back)).ok_or("date out of range")?;
        records.extend(half_hourly_day("E1", day, aest(), 0.4, 12.0));
    }
    let source = Arc::new(MockUsageSource::returning(records));
    let store = Arc::new(InMemoryCheckpointStore::new());

    // 3. Build the coordinator.
    let coordinator = UsageCoordinator::builder()
        .usage_source(source)
        .checkpoint_store(store.clone())
        .site_id("demo-site")
        .entry_title("Demo")
        .build()?;

    // 4. The first refresh writes everything, the second finds nothing new.
    for round in 1..=2 {
        let report = coordinator.refresh(today).await?;
        println!("refresh {round}: appended {} points", report.total_appended());
    }

    for series in store.series().await {
        let points = store.points(&series).await;
        if let Some(last) = points.last() {
            println!("{series}: {} points, sum {:.2}", points.len(), last.sum);
        }
    }
    println!("latest processed: {:?}", coordinator.latest_processed().await);
    Ok(())
}
