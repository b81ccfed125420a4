//! Credential hashing.
//!
//! Stored hashes are PHC strings. [`Argon2Hasher`] is the production implementation;
//! the trait lets tests swap in something cheaper.

use crate::errors::{Error, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

/// Hashes and verifies login passwords.
pub trait CredentialHasher: Send + Sync {
    /// Produces a salted hash suitable for storage.
    fn hash(&self, password: &str) -> Result<String>;

    /// Checks a password against a stored hash. A mismatch is `Ok(false)`, a malformed
    /// hash is an error.
    fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Argon2id with the crate's default parameters and a random salt per hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::PasswordHash(format!("Failed to hash password: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| Error::PasswordHash(format!("Invalid password hash format: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
