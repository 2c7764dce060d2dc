//! Tests for configuration defaults, validation and file layering

use std::io::Write;
use std::time::Duration;

use engagement_ai::config::{AppConfig, LoggingConfig, ModelConfig, StoreConfig, WebhookConfig};
use engagement_ai::error::ErrorKind;

#[test]
fn test_default_store_config() {
    let config = AppConfig::default();

    assert_eq!(config.store.data_source, "live");
    assert_eq!(config.store.database_url, "data/engagement.db");
    assert_eq!(config.store.max_connections, 10);
    assert_eq!(config.store.fixture_path, None);
}

#[test]
fn test_default_model_config() {
    let config = AppConfig::default();

    assert_eq!(config.model.model, "gpt-4o-mini");
    assert_eq!(config.model.api_key, None);
    assert_eq!(config.model.timeout(), Duration::from_secs(8));
    assert!(config.model.base_url.starts_with("https://"));
}

#[test]
fn test_default_webhook_config() {
    let config = AppConfig::default();

    assert_eq!(config.webhook.timeout(), Duration::from_secs(30));
    assert!(config.webhook.url.ends_with("/webhook/teste_ia_assistente"));
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_config_validation_success() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_unknown_data_source() {
    let mut config = AppConfig::default();
    config.store.data_source = "mock".to_string();
    let err = config.validate().expect_err("unknown source");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_config_validation_live_store_needs_url() {
    let mut config = AppConfig::default();
    config.store.database_url = "  ".to_string();
    assert!(config.validate().is_err());

    config.store.data_source = "fallback".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_zero_max_connections() {
    let mut config = AppConfig::default();
    config.store.max_connections = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_zero_timeouts() {
    let mut config = AppConfig::default();
    config.model.timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.webhook.timeout_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_empty_model_name() {
    let mut config = AppConfig::default();
    config.model.model = String::new();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_valid_log_levels() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let mut config = AppConfig::default();
        config.logging.level = level.to_string();
        assert!(config.validate().is_ok(), "Failed for level: {level}");
    }
}

#[test]
fn test_config_validation_log_formats() {
    for format in ["text", "json"] {
        let mut config = AppConfig::default();
        config.logging.format = format.to_string();
        assert!(config.validate().is_ok(), "Failed for format: {format}");
    }

    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_empty_system_user() {
    let mut config = AppConfig::default();
    config.service.system_user_id = " ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_get_log_level_from_env() {
    std::env::set_var("RUST_LOG", "debug");
    let config = AppConfig::default();
    assert_eq!(config.get_log_level(), "debug");
    std::env::remove_var("RUST_LOG");
}

#[test]
fn test_load_from_explicit_file_overrides_defaults() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        "store:\n  data_source: fallback\nmodel:\n  model: gpt-4o\n  timeout_ms: 2500\nlogging:\n  format: json"
    )
    .expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let config = AppConfig::load_from(Some(&path)).expect("load config");

    assert_eq!(config.store.data_source, "fallback");
    assert_eq!(config.model.model, "gpt-4o");
    assert_eq!(config.model.timeout(), Duration::from_millis(2500));
    assert_eq!(config.logging.format, "json");
    // untouched keys keep their defaults
    assert_eq!(config.store.max_connections, 10);
    assert_eq!(config.service.system_user_id, "system");
}

#[test]
fn test_load_from_rejects_invalid_values() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp config");
    writeln!(file, "logging:\n  level: loud").expect("write config");

    let path = file.path().to_string_lossy().to_string();
    let err = AppConfig::load_from(Some(&path)).expect_err("invalid level");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_section_structs_clone() {
    let store = StoreConfig {
        data_source: "fallback".to_string(),
        database_url: String::new(),
        max_connections: 1,
        fixture_path: Some("fixtures/units.yaml".to_string()),
    };
    assert_eq!(store.clone().fixture_path, store.fixture_path);

    let model = ModelConfig {
        api_key: Some("sk-test".to_string()),
        ..ModelConfig::default()
    };
    assert_eq!(model.clone().api_key.as_deref(), Some("sk-test"));

    let webhook = WebhookConfig {
        url: "http://localhost:5678/webhook".to_string(),
        timeout_ms: 1_000,
    };
    assert_eq!(webhook.timeout(), Duration::from_secs(1));

    let logging = LoggingConfig {
        level: "debug".to_string(),
        file_path: Some("/var/log/engagement.log".to_string()),
        format: "json".to_string(),
    };
    assert!(logging.file_path.is_some());
}
