use tubescout::{ConfigLoader, TargetConfig};

#[test]
fn test_shipped_channel_config_matches_defaults() {
    let shipped =
        TargetConfig::from_toml_str(include_str!("../../../config/channels.toml")).unwrap();
    let expected = TargetConfig {
        kind: "channel".to_string(),
        ..TargetConfig::default()
    };
    assert_eq!(shipped, expected);
}

#[test]
fn test_shipped_config_is_listed() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
    let names = ConfigLoader::new(dir).list_configs().unwrap();
    assert!(names.iter().any(|n| n == "channels"));
}
