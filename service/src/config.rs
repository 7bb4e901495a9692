//! Service configuration.

use bankledger_common::{LedgerError, Result};
use bankledger_ledger::LedgerConfig;
use bankledger_storage::StorageConfig;

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Store connection settings.
    pub storage: StorageConfig,
    /// Ledger business rules.
    pub ledger: LedgerConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Configuration backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig::in_memory(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            storage: StorageConfig::from_env(),
            ledger: LedgerConfig::from_env(),
            ..Self::default()
        };

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()?;
        self.ledger.validate()?;

        if self.log_level.trim().is_empty() {
            return Err(LedgerError::ConfigurationError(
                "Log level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
