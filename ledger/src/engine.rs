//! Core ledger engine implementation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use bankledger_common::{
    checked_sum, Account, AccountId, Amount, Check, CheckId, CheckLookup, EntityKind,
    JournalEntry, LedgerError, OperationId, OperationKind, Result, TransferRejection, UserId,
};
use bankledger_storage::{accounts, checks, journal, Store, WriteTransaction};

use crate::config::LedgerConfig;
use crate::journal::JournalBatch;

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub operation_id: OperationId,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// Outcome of a committed check validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckValidation {
    pub operation_id: OperationId,
    /// The check, now validated.
    pub check: Check,
    /// The credited account after the credit.
    pub account: Account,
}

/// Result of scanning the journal against itself and the stored balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub operations_checked: usize,
    /// Transfers whose debits and credits differ.
    pub unbalanced: Vec<OperationId>,
    pub accounts_checked: usize,
    /// Accounts whose stored balance differs from their last journaled
    /// `balance_after`.
    pub drifted: Vec<BalanceDrift>,
}

/// An account whose balance moved outside the ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub stored: Decimal,
    pub journaled: Decimal,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.unbalanced.is_empty() && self.drifted.is_empty()
    }
}

/// Applies balance mutations with their invariants.
///
/// Every mutating operation runs inside one [`WriteTransaction`]: the
/// existence and funds checks read through the same transaction that
/// writes, and the store-wide write lock keeps other mutations out until
/// commit. A failure at any step drops the transaction and nothing is
/// persisted.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Store,
    config: LedgerConfig,
}

impl LedgerEngine {
    /// Create a new ledger engine over an open store.
    pub fn new(store: Store, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn amount(&self, value: Decimal) -> Result<Amount> {
        Amount::with_max_scale(value, self.config.max_amount_scale)
    }

    /// Credit an account.
    #[instrument(skip(self))]
    pub async fn deposit(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        let amount = self.amount(amount)?;
        let operation_id = OperationId::new();

        let mut tx = self.store.begin_write().await?;
        let account = accounts::fetch_existing(tx.conn(), account_id).await?;
        let balance = amount.credit(account.balance)?;

        let mut batch = JournalBatch::new(operation_id, OperationKind::Deposit);
        batch.add_entry(JournalEntry::credit(
            operation_id,
            OperationKind::Deposit,
            account.account_id.clone(),
            amount.value(),
            balance,
        ));
        post_batch(&mut tx, &batch).await?;
        tx.commit().await?;

        info!(
            account = %account_id,
            amount = %amount,
            balance = %balance,
            operation_id = %operation_id,
            "Deposit applied"
        );

        Ok(Account { balance, ..account })
    }

    /// Debit an account.
    ///
    /// Refuses to go below zero unless overdraft is enabled.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, account_id: &AccountId, amount: Decimal) -> Result<Account> {
        let amount = self.amount(amount)?;
        let operation_id = OperationId::new();

        let mut tx = self.store.begin_write().await?;
        let account = accounts::fetch_existing(tx.conn(), account_id).await?;

        if !self.config.allow_overdraft && !account.has_sufficient_funds(amount.value()) {
            warn!(
                account = %account_id,
                amount = %amount,
                available = %account.balance,
                "Withdrawal rejected"
            );
            return Err(LedgerError::InsufficientFunds {
                required: amount.to_string(),
                available: account.balance.to_string(),
            });
        }

        let balance = amount.debit(account.balance)?;
        let mut batch = JournalBatch::new(operation_id, OperationKind::Withdrawal);
        batch.add_entry(JournalEntry::debit(
            operation_id,
            OperationKind::Withdrawal,
            account.account_id.clone(),
            amount.value(),
            balance,
        ));
        post_batch(&mut tx, &batch).await?;
        tx.commit().await?;

        info!(
            account = %account_id,
            amount = %amount,
            balance = %balance,
            operation_id = %operation_id,
            "Withdrawal applied"
        );

        Ok(Account { balance, ..account })
    }

    /// Move funds between two accounts as one unit.
    ///
    /// Both accounts must exist and the source must hold at least `amount`;
    /// otherwise `TransferRejected` and no balance changes.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let amount = self.amount(amount)?;

        if from == to {
            return Err(reject(from, to, amount, TransferRejection::SameAccount));
        }

        let mut tx = self.store.begin_write().await?;

        let source = match accounts::fetch(tx.conn(), from).await? {
            Some(account) => account,
            None => return Err(reject(from, to, amount, TransferRejection::SourceNotFound)),
        };
        let destination = match accounts::fetch(tx.conn(), to).await? {
            Some(account) => account,
            None => return Err(reject(from, to, amount, TransferRejection::DestinationNotFound)),
        };

        if !source.has_sufficient_funds(amount.value()) {
            return Err(reject(
                from,
                to,
                amount,
                TransferRejection::InsufficientFunds {
                    required: amount.to_string(),
                    available: source.balance.to_string(),
                },
            ));
        }

        let operation_id = OperationId::new();
        let from_balance = amount.debit(source.balance)?;
        let to_balance = amount.credit(destination.balance)?;

        let mut batch = JournalBatch::new(operation_id, OperationKind::Transfer);
        batch.add_entry(JournalEntry::debit(
            operation_id,
            OperationKind::Transfer,
            from.clone(),
            amount.value(),
            from_balance,
        ));
        batch.add_entry(JournalEntry::credit(
            operation_id,
            OperationKind::Transfer,
            to.clone(),
            amount.value(),
            to_balance,
        ));

        if !batch.is_balanced() {
            return Err(LedgerError::InvariantViolation(format!(
                "transfer {} is unbalanced",
                operation_id
            )));
        }

        post_batch(&mut tx, &batch).await?;
        tx.commit().await?;

        info!(
            from = %from,
            to = %to,
            amount = %amount,
            operation_id = %operation_id,
            "Transfer committed"
        );

        Ok(TransferReceipt {
            operation_id,
            from: from.clone(),
            to: to.clone(),
            amount: amount.value(),
            from_balance,
            to_balance,
        })
    }

    /// Record a check against an account. No balance effect until validated.
    #[instrument(skip(self))]
    pub async fn deposit_check(
        &self,
        check_id: &CheckId,
        account_id: &AccountId,
        amount: Decimal,
    ) -> Result<Check> {
        if !check_id.is_valid() {
            return Err(LedgerError::InvalidId {
                entity: EntityKind::Check,
                id: check_id.to_string(),
            });
        }
        let amount = self.amount(amount)?;

        let mut tx = self.store.begin_write().await?;
        accounts::fetch_existing(tx.conn(), account_id).await?;

        let check = Check::new(check_id.clone(), amount.value(), account_id.clone());
        checks::insert(tx.conn(), &check).await?;
        tx.commit().await?;

        info!(check = %check_id, account = %account_id, amount = %amount, "Check deposited");
        Ok(check)
    }

    /// Validate a pending check and credit its account, atomically.
    ///
    /// Uses the check's own account and amount. Fails with `CheckNotFound`
    /// when the check is missing or already validated; the `lookup` detail
    /// says which.
    #[instrument(skip(self))]
    pub async fn validate_check(&self, check_id: &CheckId) -> Result<CheckValidation> {
        let mut tx = self.store.begin_write().await?;

        let check = match checks::fetch(tx.conn(), check_id).await? {
            Some(check) if !check.is_validated => check,
            Some(_) => return Err(check_not_found(check_id, CheckLookup::AlreadyValidated)),
            None => return Err(check_not_found(check_id, CheckLookup::Missing)),
        };
        // Amount limits were enforced when the check was stored.
        let amount = Amount::with_max_scale(check.amount, check.amount.scale())?;

        if !checks::mark_validated(tx.conn(), check_id).await? {
            return Err(check_not_found(check_id, CheckLookup::AlreadyValidated));
        }

        let account = accounts::fetch_existing(tx.conn(), &check.account_id).await?;
        let operation_id = OperationId::new();
        let balance = amount.credit(account.balance)?;

        let mut batch = JournalBatch::new(operation_id, OperationKind::CheckValidation);
        batch.add_entry(
            JournalEntry::credit(
                operation_id,
                OperationKind::CheckValidation,
                account.account_id.clone(),
                amount.value(),
                balance,
            )
            .with_reference(check_id.as_str()),
        );
        post_batch(&mut tx, &batch).await?;
        tx.commit().await?;

        info!(
            check = %check_id,
            account = %account.account_id,
            amount = %amount,
            balance = %balance,
            operation_id = %operation_id,
            "Check validated"
        );

        Ok(CheckValidation {
            operation_id,
            check: Check {
                is_validated: true,
                ..check
            },
            account: Account { balance, ..account },
        })
    }

    /// Accounts owned by a user, accountId ascending.
    pub async fn accounts_for_user(&self, user_id: &UserId) -> Result<Vec<Account>> {
        let mut conn = self.store.acquire().await?;
        accounts::list_for_owner(&mut conn, user_id).await
    }

    /// Pending checks for an account, checkId ascending.
    pub async fn unvalidated_checks_for_account(&self, account_id: &AccountId) -> Result<Vec<Check>> {
        let mut conn = self.store.acquire().await?;
        checks::list_unvalidated_for_account(&mut conn, account_id).await
    }

    /// Journal entries touching an account, oldest first.
    pub async fn history(&self, account_id: &AccountId) -> Result<Vec<JournalEntry>> {
        let mut conn = self.store.acquire().await?;
        journal::list_for_account(&mut conn, account_id).await
    }

    /// Journal entries written by one operation.
    pub async fn operation_entries(&self, operation_id: OperationId) -> Result<Vec<JournalEntry>> {
        let mut conn = self.store.acquire().await?;
        journal::list_for_operation(&mut conn, operation_id).await
    }

    /// Sum of every account balance.
    pub async fn total_balance(&self) -> Result<Decimal> {
        let mut conn = self.store.acquire().await?;
        let all = accounts::list_all(&mut conn).await?;
        checked_sum(all.iter().map(|a| a.balance)).ok_or_else(|| {
            LedgerError::InvariantViolation("sum of balances overflows".to_string())
        })
    }

    /// Check that every journaled transfer moved as much out as in, and
    /// that every journaled account still holds its last `balance_after`.
    ///
    /// Accounts with no journal entries are skipped: their balance is the
    /// opening balance they were created with.
    #[instrument(skip(self))]
    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        let mut conn = self.store.acquire().await?;
        let entries = journal::list_by_kind(&mut conn, OperationKind::Transfer).await?;
        let batches = JournalBatch::group(entries);
        let latest = journal::latest_per_account(&mut conn).await?;

        let mut drifted = Vec::new();
        let mut accounts_checked = 0;
        for entry in latest {
            let Some(account) = accounts::fetch(&mut conn, &entry.account_id).await? else {
                continue;
            };
            accounts_checked += 1;
            if account.balance != entry.balance_after {
                drifted.push(BalanceDrift {
                    account_id: account.account_id,
                    stored: account.balance,
                    journaled: entry.balance_after,
                });
            }
        }

        let report = IntegrityReport {
            operations_checked: batches.len(),
            unbalanced: batches
                .iter()
                .filter(|b| !b.is_balanced())
                .map(|b| b.operation_id)
                .collect(),
            accounts_checked,
            drifted,
        };

        if report.is_consistent() {
            info!(
                operations = report.operations_checked,
                accounts = report.accounts_checked,
                "Journal is consistent"
            );
        } else {
            warn!(
                unbalanced = report.unbalanced.len(),
                drifted = report.drifted.len(),
                "Journal is inconsistent"
            );
        }
        Ok(report)
    }
}

/// Write each entry's resulting balance and append the entry itself.
async fn post_batch(tx: &mut WriteTransaction, batch: &JournalBatch) -> Result<()> {
    for entry in batch.entries() {
        accounts::set_balance(tx.conn(), &entry.account_id, entry.balance_after).await?;
        journal::append(tx.conn(), entry).await?;
    }
    Ok(())
}

fn reject(from: &AccountId, to: &AccountId, amount: Amount, reason: TransferRejection) -> LedgerError {
    warn!(from = %from, to = %to, amount = %amount, reason = %reason, "Transfer rejected");
    LedgerError::TransferRejected(reason)
}

fn check_not_found(check_id: &CheckId, lookup: CheckLookup) -> LedgerError {
    warn!(check = %check_id, lookup = %lookup, "Check validation rejected");
    LedgerError::CheckNotFound {
        check_id: check_id.clone(),
        lookup,
    }
}
