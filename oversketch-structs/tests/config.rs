use oversketch_structs::config::{DispatchConfig, OverSketchConfig, DEFAULT_THRESHOLD};
use oversketch_utils::dejsonify;

#[test]
fn test_config_defaults_from_json() {
    let config = dejsonify::<OverSketchConfig>(r#"{"sketch_dim": 4000}"#).unwrap();
    assert_eq!(config.sketch_dim, 4000);
    assert_eq!(config.threshold, DEFAULT_THRESHOLD);
    assert_eq!(config.seed(), None);
    assert_eq!(config.dispatch, DispatchConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_full_json() {
    let config = dejsonify::<OverSketchConfig>(
        r#"{
            "sketch_dim": 8,
            "threshold": 1.0,
            "seed": "abc",
            "dispatch": {"poll_interval_ms": 10, "phase_timeout_ms": 2000, "cancel_stragglers": true}
        }"#,
    )
    .unwrap();
    assert_eq!(config.seed().map(|s| s.as_str()), Some("abc"));
    assert_eq!(config.dispatch.poll_interval_ms, 10);
    assert_eq!(config.dispatch.phase_timeout_ms(), Some(&2000));
    assert!(config.dispatch.cancel_stragglers);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation() {
    assert!(OverSketchConfig::new(0).validate().is_err());
    assert!(OverSketchConfig::new(8).with_threshold(0.0).validate().is_err());
    assert!(OverSketchConfig::new(8).with_threshold(1.5).validate().is_err());
    assert!(OverSketchConfig::new(8)
        .with_threshold(f64::NAN)
        .validate()
        .is_err());
    assert!(OverSketchConfig::new(8).with_threshold(1.0).validate().is_ok());

    let dispatch = DispatchConfig {
        poll_interval_ms: 0,
        ..DispatchConfig::default()
    };
    assert!(OverSketchConfig::new(8)
        .with_dispatch(dispatch)
        .validate()
        .is_err());
}
