//! Argon2id password hashing collaborator.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};

use super::error::AuthError;

/// Hashes and verifies passwords with Argon2id default parameters. The
/// stored form is a PHC string, so parameters can be raised later without
/// invalidating existing hashes.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordEngine;

impl PasswordEngine {
    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns `Internal` if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow::anyhow!("failed to hash password: {err}").into())
    }

    /// Verify a password against a stored PHC string. Malformed stored
    /// hashes verify as false rather than erroring, so a corrupt row reads
    /// as bad credentials instead of a server fault.
    #[must_use]
    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}
