//! Configuration loading and config file resolution
//!
//! The editor only needs bootstrap configuration: where the gateway lives,
//! how long the autosave debounce is, and how to log. Everything else is
//! loaded from the gateway at runtime.
//!
//! # Resolution priority
//!
//! 1. Explicit path argument (highest priority)
//! 2. `FUNMAP_CONFIG` environment variable
//! 3. `<config dir>/funmap/admin.toml`
//! 4. Built-in defaults (missing file is not fatal)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FUNMAP_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Gateway endpoint that serves `?action=...` requests
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Autosave debounce configuration
    #[serde(default)]
    pub autosave: AutosaveConfig,

    /// Capacity of the editor event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Autosave debounce configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before autosave fires
    #[serde(default = "default_autosave_delay_ms")]
    pub delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_gateway_url() -> String {
    "http://localhost/gateway.php".to_string()
}

fn default_event_capacity() -> usize {
    256
}

fn default_autosave_delay_ms() -> u64 {
    800
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            autosave: AutosaveConfig::default(),
            event_capacity: default_event_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_autosave_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl AutosaveConfig {
    /// Debounce delay as a Duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no candidate exists; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: per-user config directory
    dirs::config_dir()
        .map(|d| d.join("funmap").join("admin.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration with graceful degradation
///
/// A missing or unreadable file logs a warning and yields defaults.
/// A file that parses but fails validation is still an error.
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    match load_toml_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded config file");
            Ok(config)
        }
        Err(Error::Io(e)) => {
            warn!(path = %path.display(), error = %e, "Config file unreadable, using defaults");
            Ok(TomlConfig::default())
        }
        Err(e) => Err(e),
    }
}

/// Write a config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

fn validate(config: &TomlConfig) -> Result<()> {
    if config.gateway_url.trim().is_empty() {
        return Err(Error::Config("gateway_url must not be empty".to_string()));
    }
    if config.event_capacity == 0 {
        return Err(Error::Config("event_capacity must be at least 1".to_string()));
    }
    Ok(())
}
