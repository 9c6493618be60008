use meterstat_types::{CoordinatorConfig, MeterstatError, NegativeDeltas, PortalConfig};

#[test]
fn coordinator_config_roundtrip() {
    let cfg = CoordinatorConfig {
        entry_title: "Home".to_string(),
        site_id: "site-1".to_string(),
        negative_deltas: NegativeDeltas::Reject,
        ..CoordinatorConfig::default()
    };

    let json = serde_json::to_string(&cfg).expect("serialize coordinator config");
    let de: CoordinatorConfig =
        serde_json::from_str(&json).expect("deserialize coordinator config");

    assert_eq!(de.site_id, "site-1");
    assert_eq!(de.lookback_days, 28);
    assert_eq!(de.bucket_minutes, 60);
    assert_eq!(de.negative_deltas, NegativeDeltas::Reject);
    assert_eq!(de.timezone, chrono_tz::Australia::Sydney);
}

#[test]
fn portal_config_defaults_match_export_cadence() {
    let cfg = PortalConfig::default();
    assert_eq!(cfg.interval_minutes, 5);
    assert_eq!(cfg.retention_days, cfg.fetch_range_days);
    assert_eq!(cfg.estimator_window_days, 30);
}

#[test]
fn recoverability_follows_error_kind() {
    assert!(MeterstatError::fetch("src", "503").is_recoverable());
    assert!(MeterstatError::persistence("k", "locked").is_recoverable());
    assert!(!MeterstatError::parse(Some(3), "bad date").is_recoverable());

    let agg = MeterstatError::SeriesFailed(vec![
        MeterstatError::fetch("src", "503"),
        MeterstatError::Data("negative delta".into()),
    ]);
    assert!(!agg.is_recoverable());
    assert_eq!(agg.flatten().len(), 2);
}
