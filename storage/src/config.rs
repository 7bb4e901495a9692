//! Storage configuration.

use std::time::Duration;

use bankledger_common::{LedgerError, Result};

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite URL, e.g. `sqlite://bank.db` or `sqlite::memory:`.
    pub database_url: String,
    /// Pool size. In-memory databases always use a single connection.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// How long SQLite itself retries a locked database file.
    pub busy_timeout: Duration,
    /// How long a mutation waits for the store-wide write lock.
    pub write_lock_timeout: Duration,
    /// Enforce declared foreign keys.
    pub foreign_keys: bool,
    /// Create the database file if it does not exist.
    pub create_if_missing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://bank.db".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
            write_lock_timeout: Duration::from_secs(10),
            foreign_keys: true,
            create_if_missing: true,
        }
    }
}

impl StorageConfig {
    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("BANKLEDGER_DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(max) = std::env::var("BANKLEDGER_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.max_connections = max;
            }
        }

        if let Ok(ms) = std::env::var("BANKLEDGER_WRITE_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.write_lock_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(flag) = std::env::var("BANKLEDGER_FOREIGN_KEYS") {
            if let Ok(flag) = flag.parse() {
                config.foreign_keys = flag;
            }
        }

        config
    }

    /// Whether the URL names an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }

    /// Pool size actually used.
    pub fn effective_max_connections(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.database_url.starts_with("sqlite:") {
            return Err(LedgerError::ConfigurationError(format!(
                "Database URL must use the sqlite scheme: {}",
                self.database_url
            )));
        }

        if self.max_connections == 0 {
            return Err(LedgerError::ConfigurationError(
                "Max connections cannot be 0".to_string(),
            ));
        }

        if self.write_lock_timeout.is_zero() || self.acquire_timeout.is_zero() {
            return Err(LedgerError::ConfigurationError(
                "Timeouts must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
