//! Configuration management for the Treasury host.
//!
//! This module handles loading and validation of the host configuration from a TOML file.
//! Missing tables and keys fall back to their defaults, and a missing file is created with
//! the default configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use treasury_event_system::{EventBusConfig, EventPriority};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_priority() -> EventPriority {
    EventPriority::Monitor
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Event bus tunables
    #[serde(default)]
    pub event_bus: EventBusConfig,
    /// Transaction audit settings
    #[serde(default)]
    pub audit: AuditSettings,
}

/// Logging system configuration.
///
/// Controls log output format and level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

/// Transaction audit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Whether every announced transaction is logged
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Priority of the audit subscriber; `monitor` sees the final cancelled state
    #[serde(default = "default_audit_priority")]
    pub priority: EventPriority,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            priority: default_audit_priority(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the specified path
    /// and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Returns an error string describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        self.event_bus
            .validate()
            .map_err(|e| format!("Invalid [event_bus] settings: {e}"))?;

        Ok(())
    }
}
