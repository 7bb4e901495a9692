//! Error types for BankLedger operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::CheckId;

/// Kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Account,
    Check,
    JournalEntry,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Account => "account",
            EntityKind::Check => "check",
            EntityKind::JournalEntry => "journal entry",
        };
        f.write_str(name)
    }
}

/// Why a transfer was refused before any balance moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferRejection {
    /// The source account does not exist.
    SourceNotFound,
    /// The destination account does not exist.
    DestinationNotFound,
    /// Source and destination are the same account.
    SameAccount,
    /// The source balance is below the requested amount.
    InsufficientFunds { required: String, available: String },
}

impl fmt::Display for TransferRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferRejection::SourceNotFound => f.write_str("source account not found"),
            TransferRejection::DestinationNotFound => {
                f.write_str("destination account not found")
            }
            TransferRejection::SameAccount => {
                f.write_str("source and destination are the same account")
            }
            TransferRejection::InsufficientFunds {
                required,
                available,
            } => write!(
                f,
                "insufficient funds: required {}, available {}",
                required, available
            ),
        }
    }
}

/// Why a check could not be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckLookup {
    /// No check with that id was ever deposited.
    Missing,
    /// The check exists but has already been validated.
    AlreadyValidated,
}

impl fmt::Display for CheckLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckLookup::Missing => f.write_str("does not exist"),
            CheckLookup::AlreadyValidated => f.write_str("already validated"),
        }
    }
}

/// Main error type for BankLedger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Entity absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// Insert collided with an existing primary key.
    #[error("{entity} already exists: {id}")]
    DuplicateKey { entity: EntityKind, id: String },

    /// Write refers to a row that does not exist, or removal would orphan rows.
    #[error("{entity} {id} violates a reference constraint")]
    ReferenceViolation { entity: EntityKind, id: String },

    /// Transfer refused; nothing was mutated.
    #[error("Transfer rejected: {0}")]
    TransferRejected(TransferRejection),

    /// No unvalidated check with that id.
    #[error("Check {check_id} not found: {lookup}")]
    CheckNotFound {
        check_id: CheckId,
        lookup: CheckLookup,
    },

    /// Withdrawal would drive the balance below zero.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    /// Amount is zero, negative or too precise.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    /// Identifier is empty, too long or contains forbidden characters.
    #[error("Invalid {entity} id: {id:?}")]
    InvalidId { entity: EntityKind, id: String },

    /// A persisted row could not be decoded.
    #[error("Corrupt {entity} row {id}: {reason}")]
    CorruptRow {
        entity: EntityKind,
        id: String,
        reason: String,
    },

    /// Connection-level failure; the store cannot be used.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Statement-level database failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Timed out waiting for a connection or the write lock.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A password could not be hashed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// An internal invariant did not hold; the operation was rolled back.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl LedgerError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a duplicate primary key.
    pub fn duplicate(entity: EntityKind, id: impl fmt::Display) -> Self {
        LedgerError::DuplicateKey {
            entity,
            id: id.to_string(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::StorageUnavailable(_) | LedgerError::Timeout(_)
        )
    }

    /// Check if this error is a business rejection rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::NotFound { .. }
                | LedgerError::DuplicateKey { .. }
                | LedgerError::ReferenceViolation { .. }
                | LedgerError::TransferRejected(_)
                | LedgerError::CheckNotFound { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAmount { .. }
                | LedgerError::InvalidId { .. }
        )
    }

    /// Get a stable error code for callers translating to a wire format.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::DuplicateKey { .. } => "DUPLICATE_KEY",
            LedgerError::ReferenceViolation { .. } => "REFERENCE_VIOLATION",
            LedgerError::TransferRejected(_) => "TRANSFER_REJECTED",
            LedgerError::CheckNotFound { .. } => "CHECK_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LedgerError::InvalidId { .. } => "INVALID_ID",
            LedgerError::CorruptRow { .. } => "CORRUPT_ROW",
            LedgerError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            LedgerError::Credential(_) => "CREDENTIAL_ERROR",
            LedgerError::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }
}

/// Result type alias for BankLedger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
