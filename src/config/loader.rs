//! Configuration file loading with precedence handling.

use crate::toolkit::Settings;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "VIEWKIT_CONFIG";
/// Environment variable overriding the default transition.
pub const TRANSITION_ENV: &str = "VIEWKIT_TRANSITION";

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to read config file (permission issues, not a file, ...).
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError {
        /// Path that failed to read.
        path: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Config file contains invalid TOML syntax or unknown keys.
    #[error("Invalid TOML in {path}: {reason}")]
    ParseError {
        /// Path with invalid TOML.
        path: PathBuf,
        /// Parse error details.
        reason: String,
    },
}

/// TOML configuration file structure.
///
/// All fields are optional; unset fields keep their defaults.
/// Corresponds to `~/.config/viewkit/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Default transition descriptor (e.g. "fade", "slide:up").
    #[serde(default)]
    pub transition: Option<String>,

    /// Default transition duration in milliseconds.
    #[serde(default)]
    pub duration_ms: Option<u64>,

    /// View type or template shown when a navigation fails.
    #[serde(default)]
    pub error_view: Option<String>,

    /// Whether top-level navigations write history entries.
    #[serde(default)]
    pub record_history: Option<bool>,

    /// Path to log file for tracing output.
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

/// Resolved configuration after applying precedence rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub transition: String,
    pub duration_ms: u64,
    pub error_view: String,
    pub record_history: bool,
    pub log_file_path: PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            transition: settings.transition,
            duration_ms: settings.duration.as_millis() as u64,
            error_view: settings.error_view,
            record_history: settings.record_history,
            log_file_path: default_log_path(),
        }
    }
}

impl ResolvedConfig {
    /// Runtime settings handed to the toolkit.
    pub fn settings(&self) -> Settings {
        Settings {
            transition: self.transition.clone(),
            duration: Duration::from_millis(self.duration_ms),
            error_view: self.error_view.clone(),
            record_history: self.record_history,
        }
    }
}

/// Resolve default log file path.
///
/// Returns `~/.local/state/viewkit/viewkit.log` on Linux, the platform state directory
/// elsewhere, or `viewkit.log` in the working directory when none exists.
pub fn default_log_path() -> PathBuf {
    match dirs::state_dir() {
        Some(state_dir) => state_dir.join("viewkit").join("viewkit.log"),
        None => PathBuf::from("viewkit.log"),
    }
}

/// Load configuration file from a specific path.
///
/// Returns `Ok(None)` if the file doesn't exist.
///
/// # Errors
///
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: impl Into<PathBuf>) -> Result<Option<ConfigFile>, ConfigError> {
    let path = path.into();

    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    let config: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    Ok(Some(config))
}

/// Resolve default config file path (`~/.config/viewkit/config.toml` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("viewkit").join("config.toml"))
}

/// Load configuration with precedence handling.
///
/// Precedence (highest to lowest):
/// 1. Explicit `config_path` argument (CLI `--config`)
/// 2. `VIEWKIT_CONFIG` environment variable
/// 3. Default path
///
/// # Errors
///
/// Returns error only if a config file exists but cannot be read or parsed.
pub fn load_config_with_precedence(
    config_path: Option<PathBuf>,
) -> Result<Option<ConfigFile>, ConfigError> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return load_config_file(PathBuf::from(env_path));
    }

    match default_config_path() {
        Some(default_path) => load_config_file(default_path),
        None => Ok(None),
    }
}

/// Apply `VIEWKIT_TRANSITION` to resolved config.
pub fn apply_env_overrides(mut config: ResolvedConfig) -> ResolvedConfig {
    if let Ok(transition) = std::env::var(TRANSITION_ENV) {
        config.transition = transition;
    }
    config
}

/// Merge config file into defaults.
pub fn merge_config(config_file: Option<ConfigFile>) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let Some(config) = config_file else {
        return defaults;
    };

    ResolvedConfig {
        transition: config.transition.unwrap_or(defaults.transition),
        duration_ms: config.duration_ms.unwrap_or(defaults.duration_ms),
        error_view: config.error_view.unwrap_or(defaults.error_view),
        record_history: config.record_history.unwrap_or(defaults.record_history),
        log_file_path: config.log_file_path.unwrap_or(defaults.log_file_path),
    }
}

/// Apply CLI argument overrides; flags the user did not pass are `None`.
///
/// Precedence chain: Defaults → Config File → Env Vars → CLI Args (highest)
pub fn apply_cli_overrides(
    mut config: ResolvedConfig,
    transition_override: Option<String>,
    record_history_override: Option<bool>,
) -> ResolvedConfig {
    if let Some(transition) = transition_override {
        config.transition = transition;
    }
    if let Some(record_history) = record_history_override {
        config.record_history = record_history;
    }
    config
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
