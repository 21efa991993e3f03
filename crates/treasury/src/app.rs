//! Main application logic and lifecycle management.
//!
//! The `Application` owns the event bus and the service registry other components use, the
//! transaction auditor, and the periodic statistics report. It runs until a termination
//! signal arrives.

use crate::audit::TransactionAuditor;
use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown_signal, wait_for_shutdown_signal_silent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use treasury_api::{EconomyProvider, EventBus, ServiceRegistry};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Applies command-line overrides on top of a loaded configuration.
pub fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }

    if args.json_logs {
        config.logging.json_format = true;
    }
}

/// The Treasury host.
pub struct Application {
    /// Effective configuration, after CLI overrides
    config: AppConfig,
    /// Bus economy events travel on
    bus: Arc<EventBus>,
    /// Registry where economy providers publish themselves
    services: Arc<ServiceRegistry>,
    /// Present when auditing is enabled
    auditor: Option<Arc<TransactionAuditor>>,
}

impl Application {
    /// Loads the configuration named by `args`, applies overrides and builds the application.
    ///
    /// The configuration file is created with defaults if it does not exist.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        apply_cli_overrides(&mut config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        } else {
            info!("✅ Configuration loaded and validated successfully");
        }

        display_banner();
        Self::from_config(config)
    }

    /// Builds the application from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let bus = Arc::new(EventBus::with_config(config.event_bus.clone()));
        let services = Arc::new(ServiceRegistry::new());

        let auditor = if config.audit.enabled {
            Some(TransactionAuditor::install(&bus, config.audit.priority)?)
        } else {
            info!("🧾 Transaction auditing disabled");
            None
        };

        Ok(Self {
            config,
            bus,
            services,
            auditor,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The event bus, to be shared with economy providers and listeners.
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// The service registry, to be shared with economy providers and consumers.
    pub fn services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services)
    }

    pub fn auditor(&self) -> Option<Arc<TransactionAuditor>> {
        self.auditor.clone()
    }

    /// Whether transactions of the active economy provider reach the bus.
    ///
    /// `false` only when a provider is registered and opts out of transaction events; with
    /// no provider yet, the first one to register decides.
    pub fn transactions_observable(&self) -> bool {
        self.services
            .service_for::<dyn EconomyProvider>()
            .is_none_or(|provider| provider.get().supports_transaction_events())
    }

    /// Runs until a shutdown signal is received.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Treasury");
        self.log_configuration_summary();

        let monitoring_handle = {
            let bus = Arc::clone(&self.bus);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(STATS_INTERVAL);
                // The first tick completes immediately.
                interval.tick().await;
                let mut last_fired = 0u64;

                loop {
                    interval.tick().await;

                    let stats = bus.stats();
                    let fired_this_period = stats.events_fired - last_fired;
                    last_fired = stats.events_fired;

                    info!(
                        "📊 Event bus - {} events/min | {} event types | {} subscribers | {} failed",
                        fired_this_period, stats.event_types, stats.subscribers, stats.failed_fires
                    );
                }
            })
        };

        match self.services.service_for::<dyn EconomyProvider>() {
            Some(provider) => info!(
                "💰 Economy provider: {} (from {})",
                provider.get().name(),
                provider.registrar()
            ),
            None => info!("💤 No economy provider registered yet"),
        }
        if self.auditor.is_some() && !self.transactions_observable() {
            warn!(
                "⚠️ The economy provider does not announce transactions; \
                 the audit trail stays empty"
            );
        }

        info!("✅ Treasury is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown_signal().await?;

        tokio::spawn(async move {
            if let Err(e) = wait_for_shutdown_signal_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown signal received again, exiting immediately.");
            std::process::exit(1);
        });

        monitoring_handle.abort();
        self.log_final_statistics();

        info!("✅ Treasury shutdown complete");
        Ok(())
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  📝 Log level: {}", self.config.logging.level);
        info!(
            "  🧵 Executor threads: {}-<event type>",
            self.config.event_bus.thread_name_prefix
        );
        match self.config.event_bus.thread_stack_size {
            Some(bytes) => info!("  📏 Executor stack size: {} bytes", bytes),
            None => info!("  📏 Executor stack size: platform default"),
        }
        if self.config.audit.enabled {
            info!("  🧾 Audit priority: {}", self.config.audit.priority);
        }
    }

    fn log_final_statistics(&self) {
        let stats = self.bus.stats();
        info!("📊 Final Statistics:");
        info!("  - Events fired: {}", stats.events_fired);
        info!("  - Failed fires: {}", stats.failed_fires);
        info!("  - Fires without listeners: {}", stats.unhandled_fires);
        info!("  - Event types: {}", stats.event_types);
        info!("  - Subscribers: {}", stats.subscribers);

        if let Some(auditor) = &self.auditor {
            let audit = auditor.stats();
            info!(
                "  - Transactions audited: {} ({} cancelled)",
                audit.audited, audit.cancelled
            );
        }
    }
}
