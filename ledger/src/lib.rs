//! BankLedger Ledger Engine
//!
//! Balance mutations with their invariants: deposits, withdrawals,
//! fund-checked transfers and the two-phase check lifecycle. Every mutation
//! is journaled, and transfers are double-entry.

pub mod config;
pub mod engine;
pub mod journal;

pub use config::LedgerConfig;
pub use engine::{BalanceDrift, CheckValidation, IntegrityReport, LedgerEngine, TransferReceipt};
pub use journal::JournalBatch;
