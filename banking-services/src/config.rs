//! Process configuration and logging bootstrap
//!
//! One configuration snapshot is built at process start from the
//! environment and passed explicitly into the service container; nothing
//! else reads the environment.

use std::path::PathBuf;

use cdc_bus::CdcConfig;
use loan_service::LoanConfig;
use sepa_adapter::SepaConfig;
use tracing_subscriber::EnvFilter;

/// Full application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Metadata store endpoint (external relational driver)
    pub storage_url: String,

    /// Ledger cluster id
    pub ledger_cluster_id: u32,

    /// Ledger replica addresses
    pub ledger_addresses: Vec<String>,

    /// Message broker endpoint
    pub bus_url: String,

    /// Ledger engine configuration
    pub ledger: ledger_core::Config,

    /// CDC wiring
    pub cdc: CdcConfig,

    /// Loan service and scheduler configuration
    pub loan: LoanConfig,

    /// SEPA business rules
    pub sepa: SepaConfig,

    /// System-account registry file
    pub system_accounts_path: PathBuf,

    /// Logger verbosity
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_url: "postgresql://localhost:5432/corebank".to_string(),
            ledger_cluster_id: 0,
            ledger_addresses: vec!["127.0.0.1:3000".to_string()],
            bus_url: "amqp://localhost:5672".to_string(),
            ledger: ledger_core::Config::default(),
            cdc: CdcConfig::default(),
            loan: LoanConfig::default(),
            sepa: SepaConfig::default(),
            system_accounts_path: PathBuf::from("./data/system-accounts.json"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.storage_url = url;
        }
        if let Ok(id) = std::env::var("LEDGER_CLUSTER_ID") {
            config.ledger_cluster_id = id
                .parse()
                .map_err(|_| crate::ServiceError::Config(format!("bad LEDGER_CLUSTER_ID: {}", id)))?;
        }
        if let Ok(addresses) = std::env::var("LEDGER_ADDRESSES") {
            config.ledger_addresses = addresses.split(',').map(|a| a.trim().to_string()).collect();
        }
        if let Ok(url) = std::env::var("BUS_URL") {
            config.bus_url = url;
        }
        if let Ok(path) = std::env::var("SYSTEM_ACCOUNTS_PATH") {
            config.system_accounts_path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config.ledger = ledger_core::Config::from_env()?;
        config.ledger.cluster_id = config.ledger_cluster_id;
        config.cdc = CdcConfig::from_env();
        config.loan = LoanConfig::from_env();
        config.sepa = SepaConfig::from_env();

        Ok(config)
    }
}

/// Initialize the process-wide tracing subscriber once
///
/// Later calls are no-ops, so tests sharing a process do not fight over the
/// global logger.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
