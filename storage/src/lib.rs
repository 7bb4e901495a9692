//! BankLedger Storage Adapter
//!
//! Owns the SQLite connection pool, the schema, and typed row access for
//! users, accounts, checks and the journal. No business rules live here.
//!
//! Each entity module exposes connection-level functions taking
//! `&mut SqliteConnection`, which the ledger engine composes inside one
//! [`WriteTransaction`], and a repository type for standalone CRUD.

pub mod accounts;
pub mod checks;
pub mod config;
mod error;
pub mod journal;
mod schema;
pub mod store;
pub mod users;

pub use accounts::AccountRepository;
pub use checks::CheckRepository;
pub use config::StorageConfig;
pub use journal::JournalRepository;
pub use store::{Store, WriteTransaction};
pub use users::UserRepository;
