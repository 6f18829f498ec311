//! Configuration module for the mail service.

use serde::Deserialize;
use std::path::Path;

use crate::{MailError, Result};

/// Upper bound for any anti-abuse time window, in seconds (30 days).
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/gamemail.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
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
    "logs/gamemail.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Anti-abuse thresholds for message submission.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Minimum seconds between two sends by the same player.
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    /// Maximum sends per player within any 60 second window.
    #[serde(default = "default_max_per_minute")]
    pub max_per_minute: u32,
    /// Maximum sends per player within any 3600 second window.
    #[serde(default = "default_max_per_hour")]
    pub max_per_hour: u32,
    /// Window in which an identical subject/body to the same recipient is refused.
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_secs: u64,
    /// Maximum number of attachments on one message.
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
    /// Serialize submissions per sender so the caps hold exactly under concurrency.
    #[serde(default = "default_serialize_submissions")]
    pub serialize_submissions: bool,
}

fn default_min_interval() -> u64 {
    3
}

fn default_max_per_minute() -> u32 {
    10
}

fn default_max_per_hour() -> u32 {
    50
}

fn default_duplicate_window() -> u64 {
    300 // 5 minutes
}

fn default_max_attachments() -> usize {
    20
}

fn default_serialize_submissions() -> bool {
    true
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            max_per_minute: default_max_per_minute(),
            max_per_hour: default_max_per_hour(),
            duplicate_window_secs: default_duplicate_window(),
            max_attachments: default_max_attachments(),
            serialize_submissions: default_serialize_submissions(),
        }
    }
}

/// Mailbox listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    /// Page size used when the caller does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    /// Upper bound on any requested page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

fn default_page_size() -> i64 {
    50
}

fn default_max_page_size() -> i64 {
    100
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
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
    /// Submission policy.
    #[serde(default)]
    pub mail: MailConfig,
    /// Mailbox listing.
    #[serde(default)]
    pub mailbox: MailboxConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(MailError::Io)?;
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
        toml::from_str(s).map_err(|e| MailError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GAMEMAIL_DATABASE_PATH`: Override the database file path
    /// - `GAMEMAIL_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("GAMEMAIL_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("GAMEMAIL_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(MailError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.mail.max_per_minute == 0 || self.mail.max_per_hour == 0 {
            return Err(MailError::Config(
                "mail.max_per_minute and mail.max_per_hour must be at least 1".to_string(),
            ));
        }
        if self.mail.min_interval_secs > MAX_WINDOW_SECS {
            return Err(MailError::Config(format!(
                "mail.min_interval_secs must be at most {MAX_WINDOW_SECS}"
            )));
        }
        if self.mail.duplicate_window_secs > MAX_WINDOW_SECS {
            return Err(MailError::Config(format!(
                "mail.duplicate_window_secs must be at most {MAX_WINDOW_SECS}"
            )));
        }
        if self.mail.max_per_minute > self.mail.max_per_hour {
            return Err(MailError::Config(format!(
                "mail.max_per_minute ({}) exceeds mail.max_per_hour ({})",
                self.mail.max_per_minute, self.mail.max_per_hour
            )));
        }
        if self.mailbox.max_page_size < 1 {
            return Err(MailError::Config(
                "mailbox.max_page_size must be at least 1".to_string(),
            ));
        }
        if self.mailbox.default_page_size < 1
            || self.mailbox.default_page_size > self.mailbox.max_page_size
        {
            return Err(MailError::Config(format!(
                "mailbox.default_page_size must be between 1 and {}",
                self.mailbox.max_page_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, "data/gamemail.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/gamemail.log");
        assert_eq!(config.mail.min_interval_secs, 3);
        assert_eq!(config.mail.max_per_minute, 10);
        assert_eq!(config.mail.max_per_hour, 50);
        assert_eq!(config.mail.duplicate_window_secs, 300);
        assert_eq!(config.mail.max_attachments, 20);
        assert!(config.mail.serialize_submissions);
        assert_eq!(config.mailbox.default_page_size, 50);
        assert_eq!(config.mailbox.max_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
path = "custom/mail.db"
max_connections = 2

[logging]
level = "debug"
file = "custom/mail.log"

[mail]
min_interval_secs = 1
max_per_minute = 4
max_per_hour = 20
duplicate_window_secs = 60
max_attachments = 5
serialize_submissions = false

[mailbox]
default_page_size = 10
max_page_size = 25
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.database.path, "custom/mail.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.mail.min_interval_secs, 1);
        assert_eq!(config.mail.max_per_minute, 4);
        assert_eq!(config.mail.max_per_hour, 20);
        assert_eq!(config.mail.duplicate_window_secs, 60);
        assert_eq!(config.mail.max_attachments, 5);
        assert!(!config.mail.serialize_submissions);
        assert_eq!(config.mailbox.default_page_size, 10);
        assert_eq!(config.mailbox.max_page_size, 25);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[mail]
max_per_minute = 3
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.mail.max_per_minute, 3);
        assert_eq!(config.mail.max_per_hour, 50);
        assert_eq!(config.database.path, "data/gamemail.db");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.mail.min_interval_secs, 3);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = Config::parse("[mail\nmax_per_minute = ");
        assert!(matches!(result, Err(MailError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("nonexistent/config.toml");
        assert!(matches!(result, Err(MailError::Io(_))));
    }

    #[test]
    fn test_validate_zero_cap() {
        let mut config = Config::default();
        config.mail.max_per_minute = 0;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));
    }

    #[test]
    fn test_validate_minute_cap_above_hour_cap() {
        let mut config = Config::default();
        config.mail.max_per_minute = 60;
        config.mail.max_per_hour = 50;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));
    }

    #[test]
    fn test_validate_window_bounds() {
        let mut config = Config::default();
        config.mail.duplicate_window_secs = MAX_WINDOW_SECS;
        config.mail.min_interval_secs = MAX_WINDOW_SECS;
        assert!(config.validate().is_ok());

        config.mail.duplicate_window_secs = 10_000_000_000_000_000;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));

        config.mail.duplicate_window_secs = 300;
        config.mail.min_interval_secs = u64::MAX;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));
    }

    #[test]
    fn test_validate_page_sizes() {
        let mut config = Config::default();
        config.mailbox.default_page_size = 200;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));

        config.mailbox.default_page_size = 10;
        config.mailbox.max_page_size = 0;
        assert!(matches!(config.validate(), Err(MailError::Config(_))));
    }
}
