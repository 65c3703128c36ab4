//! Per-request bearer-token verification.
//!
//! The guard turns an `Authorization: Bearer` header into a resolved
//! identity once, and handlers receive the typed result instead of digging
//! claims out of request extensions. Public endpoints never call it.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::AuthError,
    models::{User, UserSession},
    store::{CredentialStore, SessionRegistry},
    token::TokenIssuer,
};

/// Resolved caller identity attached to guarded requests.
#[derive(Clone, Debug)]
pub struct Identity {
    pub user: User,
    pub session: UserSession,
}

pub struct AccessGuard {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionRegistry>,
    tokens: TokenIssuer,
}

impl AccessGuard {
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionRegistry>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
        }
    }

    /// Resolve the bearer token in `headers` to a (user, session) pair.
    ///
    /// # Errors
    /// `TokenInvalid` for a missing/bad/expired token or a token without a
    /// device binding, `UserNotFound` when the subject no longer exists,
    /// `SessionNotFound` when the device session was revoked. The boundary
    /// maps all of these to 401.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = extract_bearer_token(headers).ok_or(AuthError::TokenInvalid)?;
        let claims = self.tokens.verify_access_token(&token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        // This deployment binds every session to a device; a token without
        // the claim cannot be matched to one.
        let device_id = claims.device_id.ok_or(AuthError::TokenInvalid)?;
        let session = self
            .sessions
            .find_by_user_and_device(user.id, &device_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        Ok(Identity { user, session })
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
