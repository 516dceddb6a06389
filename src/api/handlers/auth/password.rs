//! Password hashing and verification.
//!
//! Argon2id PHC hashes with per-password random salts. Plaintext passwords
//! exist only on the stack of these functions and are never logged.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    Hash,
    #[error("password verification failed")]
    Verify,
    #[error("stored hash has an invalid format")]
    InvalidHashFormat,
}

/// Hash a plaintext password into a PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns `PasswordError::Hash` if the hasher rejects the input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::Hash)?;

    Ok(hash.to_string())
}

/// Compare a plaintext password against a stored PHC hash.
///
/// # Errors
///
/// Returns `InvalidHashFormat` for unparseable stored hashes and `Verify`
/// when the password does not match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::Verify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() -> Result<(), PasswordError> {
        let password = "Sup3r!Secret";
        let hash = hash_password(password)?;

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).is_ok());
        assert!(matches!(
            verify_password("Wr0ng!Secret", &hash),
            Err(PasswordError::Verify)
        ));
        Ok(())
    }

    #[test]
    fn same_password_hashes_differently() -> Result<(), PasswordError> {
        let first = hash_password("Sup3r!Secret")?;
        let second = hash_password("Sup3r!Secret")?;

        // Distinct salts, but both verify.
        assert_ne!(first, second);
        assert!(verify_password("Sup3r!Secret", &first).is_ok());
        assert!(verify_password("Sup3r!Secret", &second).is_ok());
        Ok(())
    }

    #[test]
    fn invalid_stored_hash_is_detected() {
        assert!(matches!(
            verify_password("password", "not-a-valid-hash"),
            Err(PasswordError::InvalidHashFormat)
        ));
    }
}
