use dsdk_config::{ConfigError, RuntimeConfig, SenderKind};
use std::collections::HashMap;

fn load(pairs: &[(&str, &str)]) -> Result<RuntimeConfig, ConfigError> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    RuntimeConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn defaults_apply_when_only_identity_is_set() {
    let config = load(&[("DSDK_PROJECT_ID", "p1"), ("DSDK_INSTANCE_ID", "inst-1")])
        .expect("config");
    assert_eq!(config.sender, SenderKind::Mqtt);
    assert_eq!(config.mqtt_port, 1883);
    assert_eq!(config.amqp_max_channels, 8);
    assert_eq!(config.sender_max_reconnect_attempts, None);
    assert_eq!(config.control_host, config.mqtt_host);
    assert_eq!(config.control_topic_prefix, "dsdk/control");
    assert!(config.mqtt_clean_session);
}

#[test]
fn missing_project_is_reported() {
    let err = load(&[("DSDK_INSTANCE_ID", "inst-1")]).expect_err("missing");
    assert_eq!(err, ConfigError::Missing("DSDK_PROJECT_ID".to_string()));
}

#[test]
fn malformed_values_are_invalid() {
    let base = [("DSDK_PROJECT_ID", "p1"), ("DSDK_INSTANCE_ID", "inst-1")];
    let err = load(&[base[0], base[1], ("DSDK_MQTT_PORT", "eighty")]).expect_err("port");
    assert_eq!(
        err,
        ConfigError::Invalid("DSDK_MQTT_PORT".to_string(), "eighty".to_string())
    );
    assert!(load(&[base[0], base[1], ("DSDK_SENDER", "carrier-pigeon")]).is_err());
    assert!(load(&[base[0], base[1], ("DSDK_MQTT_QOS", "3")]).is_err());
    assert!(load(&[base[0], base[1], ("DSDK_CONTROL_MAX_IN_FLIGHT", "0")]).is_err());
}

#[test]
fn backend_selection_and_reconnect_policy() {
    let config = load(&[
        ("DSDK_PROJECT_ID", "p1"),
        ("DSDK_INSTANCE_ID", "inst-1"),
        ("DSDK_SENDER", "Kafka"),
        ("DSDK_SENDER_MAX_RECONNECT_ATTEMPTS", "5"),
        ("DSDK_CONTROL_PORT", "2883"),
        ("DSDK_MQTT_CLEAN_SESSION", "off"),
    ])
    .expect("config");
    assert_eq!(config.sender, SenderKind::Kafka);
    assert_eq!(config.sender_max_reconnect_attempts, Some(5));
    assert_eq!(config.control_port, 2883);
    assert!(!config.mqtt_clean_session);
}

#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("DSDK_PROJECT_ID", "p-env");
        std::env::set_var("DSDK_INSTANCE_ID", "inst-env");
        std::env::set_var("DSDK_SENDER", "memory");
    }

    let config = RuntimeConfig::from_env().expect("config");
    assert_eq!(config.project_id, "p-env");
    assert_eq!(config.sender, SenderKind::Memory);
}
