//! # Treasury - Economy Event Host
//!
//! Runs the economy event bus with configuration, structured logging and a transaction
//! audit trail. Economy providers and listeners share the bus and the service registry
//! exposed by [`Application`].
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! treasury
//!
//! # Specify custom configuration
//! treasury --config production.toml
//!
//! # Override the log level and emit JSON logs
//! treasury --log-level debug --json-logs
//! ```
//!
//! ## Configuration
//!
//! The host loads configuration from a TOML file (default: `treasury.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The host shuts down gracefully on SIGINT (Ctrl+C) and, on Unix, SIGTERM. A second
//! signal exits immediately.

use tracing::error;

mod app;
mod audit;
mod cli;
mod config;
mod logging;
mod signals;

use app::apply_cli_overrides;

pub use app::Application;
pub use audit::{AuditStats, TransactionAuditor};
pub use cli::CliArgs;
pub use config::{AppConfig, AuditSettings, LoggingSettings};

/// Runs the Treasury host until it is told to shut down.
///
/// Parses the command line, initializes logging from the configuration file (falling back
/// to defaults if it cannot be read), then builds and runs the [`Application`].
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes up before the real load so that load errors are reported.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    apply_cli_overrides(&mut config, &args);

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging, LoggingSettings::default());
        assert_eq!(config.audit, AuditSettings::default());
    }

    #[test]
    fn test_cli_parsing() {
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            log_level: Some("debug".to_string()),
            json_logs: true,
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
    }

    #[tokio::test]
    async fn test_application_creation() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("test_config.toml");

        let toml_content = toml::to_string_pretty(&AppConfig::default()).unwrap();
        tokio::fs::write(&config_path, toml_content).await.unwrap();

        let args = CliArgs {
            config_path,
            log_level: None,
            json_logs: false,
        };

        let app = Application::new(args).await.unwrap();
        assert_eq!(app.config(), &AppConfig::default());
        assert!(app.auditor().is_some());
        assert_eq!(app.bus().stats().events_fired, 0);
    }
}
