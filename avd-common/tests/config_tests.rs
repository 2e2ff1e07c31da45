//! Configuration resolution tests
//!
//! Covers the CLI → ENV → TOML → default priority order and graceful
//! degradation when no config file exists.
//!
//! Tests that touch AVD_* environment variables are marked #[serial] so they
//! never run concurrently.

use avd_common::config::{
    load_or_default, load_toml_config, resolve_api_key, resolve_log_level, ConfigOverrides,
    ServiceConfig, TomlConfig, ENV_API_KEY, ENV_CONFIG_PATH, ENV_MODEL_DIR,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn clear_env() {
    env::remove_var(ENV_API_KEY);
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_MODEL_DIR);
}

#[test]
fn test_full_toml_parses() {
    let file = write_config(
        r#"
        bind_address = "127.0.0.1"
        port = 9001
        api_key = "toml-key"
        max_body_bytes = 2048

        [model]
        model_dir = "/opt/avd/models"
        scorer_hidden = [128, 32]
        weight_prefix = "wav2vec2"

        [logging]
        level = "debug"
        "#,
    );

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.port, 9001);
    assert_eq!(config.api_key.as_deref(), Some("toml-key"));
    assert_eq!(config.max_body_bytes, 2048);
    assert_eq!(config.model.scorer_hidden, vec![128, 32]);
    assert_eq!(config.model.weight_prefix.as_deref(), Some("wav2vec2"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let file = write_config("port = \"not a number\"");
    let err = load_toml_config(file.path()).unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    clear_env();
    let missing = PathBuf::from("/nonexistent/avd/config.toml");
    assert!(load_or_default(Some(&missing)).is_err());
}

#[test]
#[serial]
fn test_env_config_path_is_used() {
    clear_env();
    let file = write_config("port = 7007");
    env::set_var(ENV_CONFIG_PATH, file.path());

    let config = load_or_default(None).unwrap();
    assert_eq!(config.port, 7007);

    clear_env();
}

#[test]
#[serial]
fn test_api_key_priority_cli_over_env_over_toml() {
    clear_env();
    let toml_config = TomlConfig {
        api_key: Some("toml-key".to_string()),
        ..Default::default()
    };

    assert_eq!(resolve_api_key(None, &toml_config).unwrap(), "toml-key");

    env::set_var(ENV_API_KEY, "env-key");
    assert_eq!(resolve_api_key(None, &toml_config).unwrap(), "env-key");
    assert_eq!(
        resolve_api_key(Some("cli-key"), &toml_config).unwrap(),
        "cli-key"
    );

    clear_env();
}

#[test]
#[serial]
fn test_blank_keys_are_skipped() {
    clear_env();
    env::set_var(ENV_API_KEY, "   ");
    let toml_config = TomlConfig {
        api_key: Some("toml-key".to_string()),
        ..Default::default()
    };
    assert_eq!(resolve_api_key(Some(""), &toml_config).unwrap(), "toml-key");
    clear_env();
}

#[test]
#[serial]
fn test_missing_api_key_fails_resolution() {
    clear_env();
    let result = ServiceConfig::resolve(&ConfigOverrides::default(), TomlConfig::default());
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_service_config_merges_overrides() {
    clear_env();
    env::set_var(ENV_MODEL_DIR, "/env/models");

    let overrides = ConfigOverrides {
        port: Some(8123),
        api_key: Some("cli-key".to_string()),
        ..Default::default()
    };
    let config = ServiceConfig::resolve(&overrides, TomlConfig::default()).unwrap();

    assert_eq!(config.port, 8123);
    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.api_key, "cli-key");
    assert_eq!(
        config.model_paths.encoder_weights,
        PathBuf::from("/env/models/model.safetensors")
    );

    clear_env();
}

#[test]
#[serial]
fn test_zero_scorer_width_rejected() {
    clear_env();
    let mut toml_config = TomlConfig {
        api_key: Some("k".to_string()),
        ..Default::default()
    };
    toml_config.model.scorer_hidden = vec![64, 0];
    assert!(ServiceConfig::resolve(&ConfigOverrides::default(), toml_config).is_err());
}

#[test]
fn test_log_level_cli_overrides_toml() {
    let mut toml_config = TomlConfig::default();
    toml_config.logging.level = "debug".to_string();

    assert_eq!(resolve_log_level(Some("trace"), &toml_config), "trace");
    assert_eq!(resolve_log_level(None, &toml_config), "debug");
    assert_eq!(resolve_log_level(None, &TomlConfig::default()), "info");
}
