use std::sync::Arc;

use chrono::{Days, TimeDelta, Utc};
use chrono_tz::Australia::Brisbane;
use meterstat::{ExportDao, PortalConfig, StreamKind};
use meterstat_mock::MockExportSource;
use meterstat_mock::fixtures::export::ExportBuilder;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Export with a week of history up to today; the portal usually lags a
    // day, so today's steps fall back to estimates where missing.
    let now = Utc::now().with_timezone(&Brisbane);
    let today = now.date_naive();
    let mut builder = ExportBuilder::new("3120000000").with_bom().stream("E1");
    for back in (1..=7).rev() {
        let day = today.checked_sub_days(Days::new(back)).ok_or("date out of range")?;
        // 07:00 to 18:00 draws more.
        builder = builder.day(day, |slot| {
            Some(if (84..216).contains(&slot) { 0.05 } else { 0.02 })
        });
    }
    let source = Arc::new(MockExportSource::returning(builder.build()));
    let dao = ExportDao::new(source, &PortalConfig::default())?;

    // Poll three times, fifteen minutes apart.
    for i in 0..3 {
        let at = now + TimeDelta::minutes(15 * i);
        let delta = dao.fetch(at).await?;
        println!("{at}: +{delta:.3} kWh");
    }

    let (total, detail) = dao
        .with_store_ref(|s| {
            let d = s.daily_total(StreamKind::Consumption, now);
            (d.total, d)
        })
        .await;
    println!("today so far: {total:.3} kWh ({detail:?})");
    Ok(())
}
