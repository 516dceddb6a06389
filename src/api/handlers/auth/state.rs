//! Auth configuration and process-wide state.
//!
//! Everything here is initialized once at startup and never mutated, so a
//! single [`AuthState`] is shared across all request tasks without locking.

use secrecy::SecretString;
use std::sync::Arc;

use super::policy::AccessPolicy;
use super::storage::UserStore;
use super::token::{TokenCodec, DEFAULT_TOKEN_TTL_SECONDS};
use super::verifier::CredentialVerifier;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    signing_key: SecretString,
    token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(crate) fn signing_key(&self) -> &SecretString {
        &self.signing_key
    }
}

/// Shared, read-only state for the authentication pipeline.
pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    policy: AccessPolicy,
    store: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>) -> Self {
        let codec = TokenCodec::new(config.signing_key().clone(), config.token_ttl_seconds());
        let verifier = CredentialVerifier::new(store.clone());
        Self {
            config,
            codec,
            policy: AccessPolicy::default(),
            store,
            verifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    #[must_use]
    pub fn store(&self) -> &dyn UserStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }
}
