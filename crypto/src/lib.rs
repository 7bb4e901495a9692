//! BankLedger Credential Primitives
//!
//! Argon2id hashing and verification of user passwords.

pub mod password;

pub use password::{hash_password, is_hashed, verify_password};

/// Errors from credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Unsupported hash scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
