//! Configuration module for postbox.

use serde::Deserialize;
use validator::ValidateEmail;
use std::path::Path;

use crate::email::DeleteMode;
use crate::{PostboxError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/postbox.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/postbox.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Email command configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EmailConfig {
    /// Sender used when a draft is created without `from`; empty means the
    /// command must carry one.
    #[serde(default)]
    pub default_from: String,
    /// What deleting a draft does to the stored row.
    #[serde(default)]
    pub delete_mode: DeleteMode,
}

/// Query paging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Page size when the caller does not give one.
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    /// Upper bound for any page size.
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

fn default_limit() -> i64 {
    50
}

fn default_max_limit() -> i64 {
    500
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Timezone for rendering timestamps (e.g., "Europe/Moscow", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// chrono format string for rendered timestamps.
    #[serde(default = "default_ts_format")]
    pub ts_format: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_ts_format() -> String {
    "%Y/%m/%d %H:%M".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            ts_format: default_ts_format(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Email command configuration.
    #[serde(default)]
    pub email: EmailConfig,
    /// Query paging configuration.
    #[serde(default)]
    pub query: QueryConfig,
    /// Display configuration.
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PostboxError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| PostboxError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `POSTBOX_DATABASE_PATH`: Override the database file path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("POSTBOX_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.query.default_limit < 1 {
            return Err(PostboxError::Config(
                "query.default_limit must be at least 1".to_string(),
            ));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(PostboxError::Config(format!(
                "query.default_limit ({}) exceeds query.max_limit ({})",
                self.query.default_limit, self.query.max_limit
            )));
        }
        let default_from = self.email.default_from.as_str();
        if !default_from.is_empty() && !default_from.validate_email() {
            return Err(PostboxError::Config(format!(
                "email.default_from is not an e-mail address: {}",
                self.email.default_from
            )));
        }
        if self.display.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(PostboxError::Config(format!(
                "unknown timezone: {}",
                self.display.timezone
            )));
        }
        Ok(())
    }
}
