//! Persisted entity models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AccountId, CheckId, EntryId, OperationId, UserId};

/// A user of the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login name, unique.
    pub id: UserId,
    /// Stored credential. Written by `register_user` as a salted hash.
    pub password: String,
    /// Free-form role name (e.g. `client`, `teller`, `admin`).
    pub role: String,
}

impl User {
    /// Create a new user record.
    pub fn new(id: impl Into<UserId>, password: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
            role: role.into(),
        }
    }
}

/// A bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub account_id: AccountId,
    /// Current balance.
    pub balance: Decimal,
    /// Owning user.
    pub owner_id: UserId,
}

impl Account {
    /// Create a new account record.
    pub fn new(
        account_id: impl Into<AccountId>,
        balance: Decimal,
        owner_id: impl Into<UserId>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            balance,
            owner_id: owner_id.into(),
        }
    }

    /// Check if account has sufficient funds for a debit.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// A deposited check. Inert until validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Unique check identifier.
    pub check_id: CheckId,
    /// Face value credited on validation.
    pub amount: Decimal,
    /// Account credited on validation.
    pub account_id: AccountId,
    /// Set once, never cleared.
    pub is_validated: bool,
}

impl Check {
    /// Create a new, unvalidated check.
    pub fn new(
        check_id: impl Into<CheckId>,
        amount: Decimal,
        account_id: impl Into<AccountId>,
    ) -> Self {
        Self {
            check_id: check_id.into(),
            amount,
            account_id: account_id.into(),
            is_validated: false,
        }
    }
}

/// Type of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Balance increased.
    Credit,
    /// Balance decreased.
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "CREDIT",
            EntryType::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(EntryType::Credit),
            "DEBIT" => Ok(EntryType::Debit),
            other => Err(format!("unknown entry type {:?}", other)),
        }
    }
}

/// Ledger operation that produced a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
    CheckValidation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "DEPOSIT",
            OperationKind::Withdrawal => "WITHDRAWAL",
            OperationKind::Transfer => "TRANSFER",
            OperationKind::CheckValidation => "CHECK_VALIDATION",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(OperationKind::Deposit),
            "WITHDRAWAL" => Ok(OperationKind::Withdrawal),
            "TRANSFER" => Ok(OperationKind::Transfer),
            "CHECK_VALIDATION" => Ok(OperationKind::CheckValidation),
            other => Err(format!("unknown operation kind {:?}", other)),
        }
    }
}

/// One immutable line of account history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID.
    pub id: EntryId,
    /// Operation this entry belongs to.
    pub operation_id: OperationId,
    /// What kind of operation produced it.
    pub operation: OperationKind,
    /// Account affected.
    pub account_id: AccountId,
    /// Entry type (credit or debit).
    pub entry_type: EntryType,
    /// Amount moved, always positive.
    pub amount: Decimal,
    /// Balance after this entry.
    pub balance_after: Decimal,
    /// Free-form reference, e.g. the validated check id.
    pub reference: Option<String>,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create a credit entry.
    pub fn credit(
        operation_id: OperationId,
        operation: OperationKind,
        account_id: AccountId,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self::build(operation_id, operation, account_id, EntryType::Credit, amount, balance_after)
    }

    /// Create a debit entry.
    pub fn debit(
        operation_id: OperationId,
        operation: OperationKind,
        account_id: AccountId,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self::build(operation_id, operation, account_id, EntryType::Debit, amount, balance_after)
    }

    fn build(
        operation_id: OperationId,
        operation: OperationKind,
        account_id: AccountId,
        entry_type: EntryType,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: EntryId::new(),
            operation_id,
            operation,
            account_id,
            entry_type,
            amount,
            balance_after,
            reference: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Signed effect on the account balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}
