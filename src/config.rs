/// Configuration management for CampusConnect
use crate::error::{WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub moderation: ModerationConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Moderation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Reports after which content should be hidden. Surfaced by the
    /// settings endpoint only; administrators always act explicitly.
    pub auto_hide_threshold: u32,
    /// Optimistic read-modify-write attempts before giving up
    pub max_attempts: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            auto_hide_threshold: 5,
            max_attempts: 8,
        }
    }
}

/// Notification fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub dispatch_timeout_ms: u64,
}

impl NotificationConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: 5000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 5000,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/campus.sqlite".into(),
                max_connections: 10,
                acquire_timeout_secs: 5,
            },
            moderation: ModerationConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> WorkflowResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CAMPUS_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("CAMPUS_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| WorkflowError::Validation("Invalid port number".to_string()))?;
        let version = env::var("CAMPUS_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("CAMPUS_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("CAMPUS_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("campus.sqlite"));
        let max_connections = env::var("CAMPUS_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let acquire_timeout_secs = env::var("CAMPUS_DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let defaults = ModerationConfig::default();
        let auto_hide_threshold = env::var("CAMPUS_MODERATION_AUTO_HIDE_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.auto_hide_threshold);
        let max_attempts = env::var("CAMPUS_MODERATION_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_attempts);

        let dispatch_timeout_ms = env::var("CAMPUS_NOTIFY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(NotificationConfig::default().dispatch_timeout_ms);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "campus_connect=debug,tower_http=debug".to_string());
        let log_json = env::var("CAMPUS_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(AppConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
                acquire_timeout_secs,
            },
            moderation: ModerationConfig {
                auto_hide_threshold,
                max_attempts,
            },
            notifications: NotificationConfig {
                dispatch_timeout_ms,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.service.hostname.is_empty() {
            return Err(WorkflowError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.storage.max_connections == 0 {
            return Err(WorkflowError::Validation(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.moderation.max_attempts == 0 {
            return Err(WorkflowError::Validation(
                "Moderation retry budget must be at least 1".to_string(),
            ));
        }

        if self.notifications.dispatch_timeout_ms == 0 {
            return Err(WorkflowError::Validation(
                "Notification dispatch timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 5000,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/campus.sqlite".into(),
                max_connections: 4,
                acquire_timeout_secs: 5,
            },
            moderation: ModerationConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }

    #[test]
    fn test_default_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.moderation.auto_hide_threshold, 5);
        assert_eq!(config.storage.database, PathBuf::from("./data/campus.sqlite"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = sample();
        config.service.hostname.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.moderation.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.notifications.dispatch_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatch_timeout_conversion() {
        let config = NotificationConfig {
            dispatch_timeout_ms: 1500,
        };
        assert_eq!(config.dispatch_timeout(), Duration::from_millis(1500));
    }
}
