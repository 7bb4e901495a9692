//! Password hashing.
//!
//! Stored values are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{CredentialError, Result};

const SCHEME_PREFIX: &str = "$argon2";

/// Hash a plaintext password with Argon2id and a fresh random salt.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// Verify a plaintext password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch and an error only when the stored
/// value cannot be parsed or names another algorithm.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|_| CredentialError::MalformedHash)?;

    if !parsed.algorithm.as_str().starts_with("argon2") {
        return Err(CredentialError::UnsupportedScheme(
            parsed.algorithm.as_str().to_string(),
        ));
    }

    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::Hashing(e.to_string())),
    }
}

/// Whether a stored credential is already an Argon2 PHC string with a hash.
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with(SCHEME_PREFIX)
        && matches!(PasswordHash::new(stored), Ok(parsed) if parsed.hash.is_some())
}
