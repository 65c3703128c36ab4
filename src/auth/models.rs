//! Domain entities and their pure state transitions.
//!
//! Entities are immutable snapshots: every mutation is a value-returning
//! `with_*` method, and the orchestrator persists the new snapshot
//! explicitly. This keeps state transitions auditable and out of the
//! storage layer.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account lifecycle. `Pending` accounts have not completed their first OTP
/// verification and never receive tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserStatus {
    Pending,
    Active,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }

    /// Parse the storage representation; unknown values are treated as
    /// `Pending` so a bad row can never grant access.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "active" {
            Self::Active
        } else {
            Self::Pending
        }
    }
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) before it ever reaches a store.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a pending account with a freshly issued OTP.
    #[must_use]
    pub fn new(email: String, password_hash: String, otp_code: String, otp_expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            otp_code: Some(otp_code),
            otp_expires_at: Some(otp_expires_at),
            email_verified: false,
            status: UserStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace any active OTP with a fresh one. Code and expiry always move
    /// together.
    #[must_use]
    pub fn with_otp(mut self, code: String, expires_at: DateTime<Utc>) -> Self {
        self.otp_code = Some(code);
        self.otp_expires_at = Some(expires_at);
        self.updated_at = Utc::now();
        self
    }

    /// Clear the OTP pair after a successful verification.
    #[must_use]
    pub fn with_cleared_otp(mut self) -> Self {
        self.otp_code = None;
        self.otp_expires_at = None;
        self.updated_at = Utc::now();
        self
    }

    /// Mark the email verified and activate the account. Status never
    /// regresses, so this is idempotent for already-active users.
    #[must_use]
    pub fn with_verified_email(mut self) -> Self {
        self.email_verified = true;
        self.status = UserStatus::Active;
        self.updated_at = Utc::now();
        self
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, UserStatus::Pending)
    }
}

#[derive(Clone, Debug)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_model: String,
    pub device_os: String,
    /// SHA-256 of the opaque refresh token. Raw tokens are only ever
    /// returned to the client, never stored.
    pub refresh_token_hash: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of a credential flow. Tokens are present only on `Success`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    Success,
    NeedOtp,
    /// Identity came from a social provider with no local account yet.
    /// Kept for wire compatibility; provider exchange lives outside this
    /// service.
    NeedSocialRegister,
}

#[derive(Clone, Debug)]
pub struct AuthResult {
    pub status: AuthStatus,
    pub access_token: Option<String>,
    /// Absolute expiry of the access token, unix seconds.
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

impl AuthResult {
    #[must_use]
    pub fn success(access_token: String, expires_in: i64, refresh_token: String) -> Self {
        Self {
            status: AuthStatus::Success,
            access_token: Some(access_token),
            expires_in: Some(expires_in),
            refresh_token: Some(refresh_token),
        }
    }

    #[must_use]
    pub const fn need_otp() -> Self {
        Self {
            status: AuthStatus::NeedOtp,
            access_token: None,
            expires_in: None,
            refresh_token: None,
        }
    }

    #[must_use]
    pub const fn need_social_register() -> Self {
        Self {
            status: AuthStatus::NeedSocialRegister,
            access_token: None,
            expires_in: None,
            refresh_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_user() -> User {
        User::new(
            "alice@example.com".to_string(),
            "$argon2id$stub".to_string(),
            "482913".to_string(),
            Utc::now() + Duration::minutes(5),
        )
    }

    #[test]
    fn new_user_is_pending_and_unverified() {
        let user = sample_user();
        assert!(user.is_pending());
        assert!(!user.email_verified);
        assert!(user.otp_code.is_some());
        assert!(user.otp_expires_at.is_some());
    }

    #[test]
    fn otp_fields_move_together() {
        let user = sample_user().with_cleared_otp();
        assert!(user.otp_code.is_none());
        assert!(user.otp_expires_at.is_none());

        let expires = Utc::now() + Duration::minutes(5);
        let user = user.with_otp("000042".to_string(), expires);
        assert_eq!(user.otp_code.as_deref(), Some("000042"));
        assert_eq!(user.otp_expires_at, Some(expires));
    }

    #[test]
    fn verified_email_activates_and_never_regresses() {
        let user = sample_user().with_verified_email();
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.email_verified);

        // A second verification keeps the account active.
        let user = user.with_verified_email();
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn status_parse_defaults_to_pending() {
        assert_eq!(UserStatus::parse("active"), UserStatus::Active);
        assert_eq!(UserStatus::parse("pending"), UserStatus::Pending);
        assert_eq!(UserStatus::parse("corrupt"), UserStatus::Pending);
    }

    #[test]
    fn need_otp_carries_no_tokens() {
        let result = AuthResult::need_otp();
        assert_eq!(result.status, AuthStatus::NeedOtp);
        assert!(result.access_token.is_none());
        assert!(result.expires_in.is_none());
        assert!(result.refresh_token.is_none());
    }

    #[test]
    fn success_carries_all_tokens() {
        let result = AuthResult::success("jwt".to_string(), 1_700_000_000, "opaque".to_string());
        assert_eq!(result.status, AuthStatus::Success);
        assert_eq!(result.access_token.as_deref(), Some("jwt"));
        assert_eq!(result.expires_in, Some(1_700_000_000));
        assert_eq!(result.refresh_token.as_deref(), Some("opaque"));
    }
}
