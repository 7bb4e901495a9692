//! BankLedger Common Types
//!
//! Shared types used across the BankLedger crates: identifiers, amounts,
//! the persisted entity models and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod model;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use model::*;
pub use error::*;
