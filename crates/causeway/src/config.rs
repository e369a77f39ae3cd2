//! Configuration file support for causeway.
//!
//! All causeway data is stored in a `.causeway/` directory:
//! - `.causeway/config.toml` - Configuration file
//! - `.causeway/sessions/<id>/` - Per-run log and record files
//!
//! Config discovery searches for `.causeway/config.toml` starting from the
//! current directory and walking up to parent directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use causeway_logging::{AppInfo, ConsoleFormat, LogLevel};
use serde::{Deserialize, Serialize};

/// The causeway data directory name.
pub const CAUSEWAY_DIR: &str = ".causeway";
/// The config file name within the causeway directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Identity stamped on every formatted entry.
    pub app: AppConfig,
    /// Domain logger settings.
    pub logging: LoggingConfig,
    /// Causality manager settings.
    pub actions: ActionsConfig,
    /// Background job settings.
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub id: u64,
    pub group_id: u64,
    pub name: String,
    pub version: String,
    pub env: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: 0,
            group_id: 0,
            name: "causeway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            env: "development".to_string(),
        }
    }
}

impl AppConfig {
    pub fn to_app_info(&self) -> AppInfo {
        AppInfo {
            id: self.id,
            group_id: self.group_id,
            name: self.name.clone(),
            version: self.version.clone(),
            env: self.env.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub min_level: LogLevel,
    pub max_level: LogLevel,
    /// Request application stop when a log call fails.
    pub stop_app_on_error: bool,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Trace,
            max_level: LogLevel::Fatal,
            stop_app_on_error: false,
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub min_level: LogLevel,
    pub max_level: LogLevel,
    pub format: ConsoleFormat,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: LogLevel::Info,
            max_level: LogLevel::Fatal,
            format: ConsoleFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub min_level: LogLevel,
    pub max_level: LogLevel,
    /// Log file (session mode) or directory (daily rotation). Relative paths
    /// resolve against the session directory.
    pub path: PathBuf,
    pub session_mode: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: LogLevel::Trace,
            max_level: LogLevel::Fatal,
            path: PathBuf::from("app.jsonl"),
            session_mode: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Write lifecycle records alongside log entries.
    pub records_enabled: bool,
    /// Record file, relative to the session directory unless absolute.
    pub records_path: PathBuf,
    /// Request application stop when an executor fails to complete its work.
    pub stop_app_on_error: bool,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            records_enabled: true,
            records_path: PathBuf::from("actions.jsonl"),
            stop_app_on_error: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    pub heartbeat_enabled: bool,
    pub heartbeat_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            heartbeat_enabled: true,
            heartbeat_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Find and load configuration from current or parent directories.
    pub fn find_and_load() -> Result<Option<(Self, PathBuf)>> {
        let current = std::env::current_dir()?;
        Self::find_and_load_from(&current)
    }

    /// Find and load configuration starting from a specific directory.
    ///
    /// Returns the config and the `.causeway` directory it was found in.
    pub fn find_and_load_from(start: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start.to_path_buf();

        loop {
            let causeway_dir = dir.join(CAUSEWAY_DIR);
            let config_path = causeway_dir.join(CONFIG_FILE);
            if config_path.exists() {
                let config = Self::from_file(&config_path)?;
                return Ok(Some((config, causeway_dir)));
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a configured path against the session directory.
    pub fn resolve_path(path: &Path, session_dir: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            session_dir.join(path)
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

fn check_level_range(
    errors: &mut Vec<ConfigValidationError>,
    section: &str,
    min: LogLevel,
    max: LogLevel,
) {
    if !LogLevel::is_valid_range(min, max) {
        errors.push(ConfigValidationError {
            field: format!("{section}.min_level"),
            message: format!(
                "Invalid level range '{min}'..'{max}'. min_level must not exceed max_level and neither may be 'none'."
            ),
        });
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// Returns a list of validation errors if any are found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.app.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "app.name".to_string(),
                message: "Application name cannot be empty.".to_string(),
            });
        }

        check_level_range(
            &mut errors,
            "logging",
            self.logging.min_level,
            self.logging.max_level,
        );
        if self.logging.console.enabled {
            check_level_range(
                &mut errors,
                "logging.console",
                self.logging.console.min_level,
                self.logging.console.max_level,
            );
        }
        if self.logging.file.enabled {
            check_level_range(
                &mut errors,
                "logging.file",
                self.logging.file.min_level,
                self.logging.file.max_level,
            );
            if self.logging.file.path.as_os_str().is_empty() {
                errors.push(ConfigValidationError {
                    field: "logging.file.path".to_string(),
                    message: "Log file path cannot be empty.".to_string(),
                });
            }
        }

        if self.actions.records_enabled && self.actions.records_path.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "actions.records_path".to_string(),
                message: "Records path cannot be empty.".to_string(),
            });
        }

        if self.jobs.heartbeat_enabled && self.jobs.heartbeat_interval_secs == 0 {
            errors.push(ConfigValidationError {
                field: "jobs.heartbeat_interval_secs".to_string(),
                message: "Heartbeat interval must be at least one second.".to_string(),
            });
        }

        errors
    }
}

/// Contents written by `causeway init`.
pub const DEFAULT_CONFIG: &str = r#"# causeway configuration
# Relative paths resolve against the per-run session directory

[app]
name = "causeway"
env = "development"

[logging]
min_level = "trace"
max_level = "fatal"
stop_app_on_error = false  # Stop the application when a log call fails

[logging.console]
enabled = true
min_level = "info"
max_level = "fatal"
format = "text"  # Options: "text", "json"

[logging.file]
enabled = true
min_level = "trace"
max_level = "fatal"
path = "app.jsonl"
session_mode = true  # false: daily files under `path` as a directory

[actions]
records_enabled = true
records_path = "actions.jsonl"
stop_app_on_error = false

[jobs]
heartbeat_enabled = true
heartbeat_interval_secs = 60
"#;
