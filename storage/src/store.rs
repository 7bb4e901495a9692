//! Storage handle: connection pool, schema bootstrap and write transactions.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{Sqlite, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument};

use bankledger_common::{LedgerError, Result};

use crate::config::StorageConfig;
use crate::error::storage_error;
use crate::schema;

/// Explicit handle to the persistent store.
///
/// Cloning is cheap and shares the pool and write lock. The caller owns the
/// lifetime: nothing is global, and [`Store::close`] releases the pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    /// SQLite admits one writer at a time; serialising writers in-process
    /// keeps read-check-then-write sequences free of interleaving and avoids
    /// `SQLITE_BUSY` on lock upgrade.
    write_gate: Arc<Mutex<()>>,
    config: Arc<StorageConfig>,
}

impl Store {
    /// Open the pool and verify the database answers.
    ///
    /// Fails with `StorageUnavailable` rather than handing back an unusable
    /// handle.
    #[instrument(skip(config), fields(url = %config.database_url))]
    pub async fn connect(config: StorageConfig) -> Result<Self> {
        config.validate()?;

        let mut options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| LedgerError::ConfigurationError(e.to_string()))?
            .create_if_missing(config.create_if_missing)
            .foreign_keys(config.foreign_keys)
            .busy_timeout(config.busy_timeout);

        if !config.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.effective_max_connections())
            .acquire_timeout(config.acquire_timeout);

        // The database vanishes with its last connection.
        if config.is_in_memory() {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;

        info!(
            max_connections = config.effective_max_connections(),
            "Connected to store"
        );

        Ok(Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        })
    }

    /// Create all tables and indexes if absent. Safe to run repeatedly.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<()> {
        let mut tx = self.begin_write().await?;
        for statement in schema::statements() {
            sqlx::query(statement)
                .execute(tx.conn())
                .await
                .map_err(storage_error)?;
        }
        tx.commit().await?;

        info!("Schema bootstrap complete");
        Ok(())
    }

    /// Acquire a pooled connection for reads.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(storage_error)
    }

    /// Take the write lock and open a transaction.
    ///
    /// The lock is held until the returned transaction is committed or
    /// dropped; dropping without commit rolls back.
    pub async fn begin_write(&self) -> Result<WriteTransaction> {
        let guard = tokio::time::timeout(
            self.config.write_lock_timeout,
            self.write_gate.clone().lock_owned(),
        )
        .await
        .map_err(|_| {
            LedgerError::Timeout(format!(
                "write lock not acquired within {:?}",
                self.config.write_lock_timeout
            ))
        })?;

        let tx = self.pool.begin().await.map_err(storage_error)?;
        debug!("Write transaction started");

        Ok(WriteTransaction { tx, _guard: guard })
    }

    /// Get the configuration the store was opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Whether [`Store::close`] has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(self) {
        self.pool.close().await;
        info!("Store closed");
    }
}

/// A database transaction holding the store-wide write lock.
pub struct WriteTransaction {
    // Field order matters: the transaction rolls back before the lock is released.
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTransaction {
    /// Connection to run statements on inside this transaction.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Commit all writes and release the lock.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage_error)?;
        debug!("Write transaction committed");
        Ok(())
    }

    /// Discard all writes and release the lock.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let store = memory_store().await;

        sqlx::query("INSERT INTO users (id, password, role) VALUES (?, ?, ?)")
            .bind("u1")
            .bind("pw")
            .bind("client")
            .execute(&mut *store.acquire().await.unwrap())
            .await
            .unwrap();

        store.bootstrap().await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *store.acquire().await.unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = memory_store().await;

        {
            let mut tx = store.begin_write().await.unwrap();
            sqlx::query("INSERT INTO users (id, password, role) VALUES ('u1', 'pw', 'client')")
                .execute(tx.conn())
                .await
                .unwrap();
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *store.acquire().await.unwrap())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_write_lock_times_out() {
        let mut config = StorageConfig::in_memory();
        config.write_lock_timeout = Duration::from_millis(20);
        let store = Store::connect(config).await.unwrap();

        let _held = store.begin_write().await.unwrap();
        let err = store.begin_write().await.err().unwrap();
        assert!(matches!(err, LedgerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let mut config = StorageConfig::default();
        config.database_url = "mysql://nowhere".to_string();
        let err = Store::connect(config).await.err().unwrap();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[tokio::test]
    async fn test_connect_fails_fast_on_unopenable_file() {
        let mut config = StorageConfig::default();
        config.database_url = "sqlite:///nonexistent-dir/bank.db".to_string();
        config.create_if_missing = false;
        let err = Store::connect(config).await.err().unwrap();
        assert!(matches!(err, LedgerError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = memory_store().await;
        let handle = store.clone();
        store.close().await;

        assert!(handle.is_closed());
        let err = handle.acquire().await.err().unwrap();
        assert!(matches!(err, LedgerError::StorageUnavailable(_)));
    }
}
