//! Service facade implementation.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use bankledger_common::{
    Account, AccountId, Check, CheckId, JournalEntry, LedgerError, OperationId, Result, User,
    UserId,
};
use bankledger_crypto::{hash_password, is_hashed, verify_password};
use bankledger_ledger::{CheckValidation, IntegrityReport, LedgerEngine, TransferReceipt};
use bankledger_storage::{
    AccountRepository, CheckRepository, JournalRepository, Store, UserRepository,
};

use crate::config::ServiceConfig;
use crate::metrics::ServiceMetrics;
use crate::state::ServiceState;

/// The single entry point over repositories and the ledger engine.
///
/// Cloning shares the underlying store, metrics and lifecycle state.
#[derive(Clone)]
pub struct BankService {
    config: Arc<ServiceConfig>,
    store: Store,
    users: UserRepository,
    accounts: AccountRepository,
    checks: CheckRepository,
    journal: JournalRepository,
    engine: LedgerEngine,
    metrics: Arc<ServiceMetrics>,
    state: Arc<RwLock<ServiceState>>,
}

impl BankService {
    /// Connect to the configured store and bootstrap its schema.
    #[instrument(skip(config), fields(url = %config.storage.database_url))]
    pub async fn open(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let store = Store::connect(config.storage.clone()).await?;
        store.bootstrap().await?;

        let service = Self {
            users: UserRepository::new(store.clone()),
            accounts: AccountRepository::new(store.clone()),
            checks: CheckRepository::new(store.clone()),
            journal: JournalRepository::new(store.clone()),
            engine: LedgerEngine::new(store.clone(), config.ledger.clone()),
            store,
            config: Arc::new(config),
            metrics: Arc::new(ServiceMetrics::new()),
            state: Arc::new(RwLock::new(ServiceState::Running)),
        };

        info!(
            allow_overdraft = service.config.ledger.allow_overdraft,
            "Bank service opened"
        );
        Ok(service)
    }

    /// Stop accepting requests and release the store.
    pub async fn close(&self) {
        {
            let mut state = self.state.write();
            if !state.accepts_requests() {
                return;
            }
            *state = ServiceState::ShuttingDown;
        }

        self.store.clone().close().await;
        *self.state.write() = ServiceState::Stopped;
        info!("Bank service closed");
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    fn ensure_open(&self) -> Result<()> {
        let state = self.state();
        if state.accepts_requests() {
            Ok(())
        } else {
            Err(LedgerError::StorageUnavailable(format!(
                "service is {:?}",
                state
            )))
        }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        self.metrics.record(&result);
        result
    }

    // Users

    /// Insert a user. A plaintext password is hashed before it is stored.
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn add_user(&self, user: &User) -> Result<()> {
        self.ensure_open()?;
        let result = match stored_credential(&user.password) {
            Ok(password) => {
                let stored = User {
                    password,
                    ..user.clone()
                };
                self.users.add(&stored).await
            }
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    /// Create a user from a plaintext password and return the stored record.
    #[instrument(skip(self, password))]
    pub async fn register_user(&self, id: &UserId, password: &str, role: &str) -> Result<User> {
        self.ensure_open()?;
        let result = match credential(password) {
            Ok(hash) => {
                let user = User::new(id.clone(), hash, role);
                self.users.add(&user).await.map(|_| user)
            }
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    /// Check a user's password against the stored Argon2 hash.
    ///
    /// Unknown users and unreadable stored hashes both answer `false`.
    #[instrument(skip(self, password))]
    pub async fn authenticate_user(&self, id: &UserId, password: &str) -> Result<bool> {
        self.ensure_open()?;
        let result = self.users.find(id).await.map(|user| match user {
            Some(user) => verify_password(password, &user.password).unwrap_or_else(|e| {
                warn!(user = %id, error = %e, "Stored credential unreadable");
                false
            }),
            None => false,
        });

        if matches!(result, Ok(false)) {
            self.metrics.authentication_failed();
            warn!(user = %id, "Authentication failed");
        }
        self.observe(result)
    }

    pub async fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        self.ensure_open()?;
        self.observe(self.users.find(id).await)
    }

    /// Replace a user's password and role. A plaintext password is hashed.
    #[instrument(skip(self, user), fields(user = %user.id))]
    pub async fn update_user(&self, user: &User) -> Result<()> {
        self.ensure_open()?;
        let result = match stored_credential(&user.password) {
            Ok(password) => {
                let stored = User {
                    password,
                    ..user.clone()
                };
                self.users.update(&stored).await
            }
            Err(e) => Err(e),
        };
        self.observe(result)
    }

    #[instrument(skip(self))]
    pub async fn remove_user(&self, id: &UserId) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.users.remove(id).await)
    }

    // Accounts

    #[instrument(skip(self, account), fields(account = %account.account_id))]
    pub async fn add_account(&self, account: &Account) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.accounts.add(account).await)
    }

    pub async fn find_account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.ensure_open()?;
        self.observe(self.accounts.find(id).await)
    }

    /// Administrative full-row replace; not journaled.
    #[instrument(skip(self, account), fields(account = %account.account_id))]
    pub async fn update_account(&self, account: &Account) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.accounts.update(account).await)
    }

    #[instrument(skip(self))]
    pub async fn remove_account(&self, id: &AccountId) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.accounts.remove(id).await)
    }

    /// Every account, accountId ascending.
    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.ensure_open()?;
        self.observe(self.accounts.list_all().await)
    }

    // Checks

    /// Insert a check row as given. Prefer `deposit_check` for new deposits.
    #[instrument(skip(self, check), fields(check = %check.check_id))]
    pub async fn add_check(&self, check: &Check) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.checks.add(check).await)
    }

    /// Replace a check's amount and account. The validation flag is left
    /// to `validate_check`; changing it here is refused.
    #[instrument(skip(self, check), fields(check = %check.check_id))]
    pub async fn update_check(&self, check: &Check) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.checks.update(check).await)
    }

    pub async fn find_check(&self, id: &CheckId) -> Result<Option<Check>> {
        self.ensure_open()?;
        self.observe(self.checks.find(id).await)
    }

    #[instrument(skip(self))]
    pub async fn remove_check(&self, id: &CheckId) -> Result<()> {
        self.ensure_open()?;
        self.observe(self.checks.remove(id).await)
    }

    // Ledger operations

    pub async fn deposit(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        self.ensure_open()?;
        self.observe(self.engine.deposit(account_id, amount).await)
    }

    pub async fn withdraw(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        self.ensure_open()?;
        self.observe(self.engine.withdraw(account_id, amount).await)
    }

    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        self.ensure_open()?;
        let result = self.engine.transfer(from, to, amount).await;
        if result.is_ok() {
            self.metrics.transfer_committed();
        }
        self.observe(result)
    }

    pub async fn deposit_check(
        &self,
        check_id: &CheckId,
        account_id: &AccountId,
        amount: Decimal,
    ) -> Result<Check> {
        self.ensure_open()?;
        self.observe(self.engine.deposit_check(check_id, account_id, amount).await)
    }

    pub async fn validate_check(&self, check_id: &CheckId) -> Result<CheckValidation> {
        self.ensure_open()?;
        let result = self.engine.validate_check(check_id).await;
        if result.is_ok() {
            self.metrics.check_validated();
        }
        self.observe(result)
    }

    // Queries

    pub async fn accounts_for_user(&self, user_id: &UserId) -> Result<Vec<Account>> {
        self.ensure_open()?;
        self.observe(self.engine.accounts_for_user(user_id).await)
    }

    pub async fn unvalidated_checks_for_account(&self, account_id: &AccountId) -> Result<Vec<Check>> {
        self.ensure_open()?;
        self.observe(self.engine.unvalidated_checks_for_account(account_id).await)
    }

    /// Journal entries touching an account, oldest first.
    pub async fn account_history(&self, account_id: &AccountId) -> Result<Vec<JournalEntry>> {
        self.ensure_open()?;
        self.observe(self.journal.history_for_account(account_id).await)
    }

    pub async fn operation_entries(&self, operation_id: OperationId) -> Result<Vec<JournalEntry>> {
        self.ensure_open()?;
        self.observe(self.journal.entries_for_operation(operation_id).await)
    }

    pub async fn total_balance(&self) -> Result<Decimal> {
        self.ensure_open()?;
        self.observe(self.engine.total_balance().await)
    }

    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        self.ensure_open()?;
        self.observe(self.engine.verify_integrity().await)
    }
}

fn credential(password: &str) -> Result<String> {
    hash_password(password).map_err(|e| LedgerError::Credential(e.to_string()))
}

fn stored_credential(password: &str) -> Result<String> {
    if is_hashed(password) {
        Ok(password.to_string())
    } else {
        credential(password)
    }
}
