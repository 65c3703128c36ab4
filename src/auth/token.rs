//! Access token signing/verification and opaque refresh token minting.
//!
//! Access tokens are short-lived HS256 JWTs carrying `sub`, an optional
//! `deviceId`, `iat`, and `exp`. Refresh tokens are opaque random strings
//! with no embedded claims; they only resolve through the session registry,
//! and only their SHA-256 hash is ever stored.

use anyhow::Context;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;

/// Claims carried by a signed access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: String,
    /// Device the session is bound to, when the deployment binds per device.
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    header: Header,
    validation: Validation,
    access_ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, access_ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expired tokens must fail at their expiry, not a minute later.
        validation.leeway = 0;
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(bytes)),
            decoding_key: Arc::new(DecodingKey::from_secret(bytes)),
            header: Header::new(Algorithm::HS256),
            validation,
            access_ttl_seconds: access_ttl_seconds.max(1),
        }
    }

    /// Sign an access token for `subject`, returning the token and its
    /// absolute expiry in unix seconds.
    ///
    /// # Errors
    /// Returns `Internal` if encoding fails.
    pub fn sign_access_token(
        &self,
        subject: Uuid,
        device_id: Option<&str>,
    ) -> Result<(String, i64), AuthError> {
        let now = Utc::now().timestamp();
        let exp = now + self.access_ttl_seconds;
        let claims = AccessClaims {
            sub: subject.to_string(),
            device_id: device_id.map(str::to_string),
            iat: now,
            exp,
        };
        let token = jsonwebtoken::encode(&self.header, &claims, &self.encoding_key)
            .context("failed to sign access token")?;
        Ok((token, exp))
    }

    /// Decode and validate an access token.
    ///
    /// # Errors
    /// `TokenInvalid` on any signature, structure, or expiry failure.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::TokenInvalid)
    }

    /// Mint an opaque refresh token: 32 random bytes, URL-safe base64.
    ///
    /// # Errors
    /// Returns `Internal` if the OS entropy source fails.
    pub fn issue_opaque_token() -> Result<String, AuthError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate refresh token")?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Hash an opaque token for storage and lookup; raw values never touch
    /// the store.
    #[must_use]
    pub fn hash_opaque_token(token: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().to_vec()
    }

    #[must_use]
    pub const fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }
}
