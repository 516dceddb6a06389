//! Credential verification against stored password hashes.

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::password::verify_password;
use super::storage::{UserRecord, UserStore};

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Unknown username and wrong password are indistinguishable on purpose,
    /// so the endpoint cannot be used to probe which accounts exist.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

/// Checks a username/password pair against the stored hash.
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Verify credentials and return the matching user record.
    ///
    /// The plaintext password is compared only through the salted slow hash
    /// and is never logged.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for unknown users and mismatched passwords alike;
    /// `Unavailable` when the store cannot be reached.
    pub async fn verify(&self, username: &str, password: &str) -> Result<UserRecord, VerifyError> {
        let record = self
            .store
            .find_by_username(username)
            .await
            .map_err(VerifyError::Unavailable)?;

        let Some(record) = record else {
            debug!("Unknown username presented for authentication");
            return Err(VerifyError::InvalidCredentials);
        };

        verify_password(password, &record.password_hash)
            .map_err(|_| VerifyError::InvalidCredentials)?;

        Ok(record)
    }
}
