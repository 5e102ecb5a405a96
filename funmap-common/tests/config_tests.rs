//! Unit tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FUNMAP_CONFIG are marked with #[serial].

use funmap_common::config::{
    load_or_default, load_toml_config, resolve_config_path, write_toml_config, AutosaveConfig,
    LoggingConfig, TomlConfig, CONFIG_ENV_VAR,
};
use funmap_common::Error;
use serial_test::serial;
use std::env;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = TomlConfig::default();
    assert_eq!(config.gateway_url, "http://localhost/gateway.php");
    assert_eq!(config.autosave.delay_ms, 800);
    assert_eq!(config.autosave.delay(), Duration::from_millis(800));
    assert_eq!(config.event_capacity, 256);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("admin.toml");
    std::fs::write(&path, "gateway_url = \"https://example.test/gateway.php\"\n").unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.gateway_url, "https://example.test/gateway.php");
    assert_eq!(config.autosave, AutosaveConfig::default());
    assert_eq!(config.logging, LoggingConfig::default());
}

#[test]
fn test_write_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("admin.toml");

    let mut config = TomlConfig::default();
    config.autosave.delay_ms = 1500;
    config.logging.level = "debug".to_string();

    write_toml_config(&config, &path).unwrap();
    assert_eq!(load_toml_config(&path).unwrap(), config);
}

#[test]
fn test_empty_gateway_url_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("admin.toml");
    std::fs::write(&path, "gateway_url = \"  \"\n").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("admin.toml");
    std::fs::write(&path, "gateway_url = [unterminated").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/funmap-env.toml");
    let explicit = std::path::Path::new("/tmp/funmap-explicit.toml");

    assert_eq!(resolve_config_path(Some(explicit)), Some(explicit.to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_explicit_path() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/funmap-env.toml");

    assert_eq!(
        resolve_config_path(None),
        Some(std::path::PathBuf::from("/tmp/funmap-env.toml"))
    );

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_degrades_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("does-not-exist.toml");

    let config = load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
}
