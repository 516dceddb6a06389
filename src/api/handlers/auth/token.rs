//! Signed token issuance and verification.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url)
//! signed with a process-wide HMAC-SHA256 key. The payload is not
//! confidential; the signature keeps it tamper-evident and self-contained, so
//! no server-side session state is needed to authenticate a request.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use super::principal::Role;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 10 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub sub: String,
    pub roles: Vec<Role>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Issues and verifies signed tokens with a fixed expiry window.
///
/// The signing key and TTL come from process-wide configuration initialized
/// at startup and never mutated, so one codec is safely shared across
/// arbitrarily many concurrent requests.
pub struct TokenCodec {
    key: SecretString,
    ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(key: SecretString, ttl_seconds: i64) -> Self {
        Self { key, ttl_seconds }
    }

    fn mac(&self) -> Result<HmacSha256, Error> {
        HmacSha256::new_from_slice(self.key.expose_secret().as_bytes()).map_err(|_| Error::Key)
    }

    /// Create a signed token for `subject` expiring `ttl_seconds` after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be encoded or the key is unusable.
    pub fn issue(&self, subject: &str, roles: &[Role], now: i64) -> Result<String, Error> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims = TokenClaims {
            sub: subject.to_string(),
            roles: roles.to_vec(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// The signature is checked before the claims are trusted; expiry is
    /// checked last so a tampered expiry cannot mask a bad signature.
    ///
    /// # Errors
    ///
    /// Returns `Expired` past the expiry instant and a malformed-token error
    /// (`TokenFormat`, `Base64`, `Json`, `UnsupportedAlg`, `InvalidSignature`)
    /// for anything that does not verify.
    pub fn decode(&self, token: &str, now: i64) -> Result<TokenClaims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let mut mac = self.mac()?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        // verify_slice is constant-time.
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let claims: TokenClaims = b64d_json(claims_b64)?;
        if claims.exp <= now {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    /// Extract the subject of a verified, unexpired token.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TokenCodec::decode`].
    pub fn extract_subject(&self, token: &str, now: i64) -> Result<String, Error> {
        Ok(self.decode(token, now)?.sub)
    }

    /// Re-verify signature and expiry and compare the embedded subject.
    ///
    /// Never fails on tampered input; any defect yields `false`.
    #[must_use]
    pub fn validate(&self, token: &str, expected_subject: &str, now: i64) -> bool {
        self.decode(token, now)
            .map_or(false, |claims| claims.sub == expected_subject)
    }
}
