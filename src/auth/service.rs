//! Use-case orchestration: login, register, OTP verification, refresh,
//! logout, and device removal.
//!
//! This is the only component with cross-entity business rules. It never
//! mutates entities in place: every state change is a `with_*` transition
//! persisted explicitly, and tokens are only surfaced after the matching
//! session write succeeded.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{
    error::AuthError,
    mail::MailDispatch,
    models::{AuthResult, User, UserSession},
    otp::OtpChallenge,
    password::PasswordEngine,
    state::AuthConfig,
    store::{CredentialStore, NewSession, SessionRegistry},
    token::TokenIssuer,
};

/// Client-reported device identity captured at registration.
#[derive(Clone, Debug)]
pub struct DeviceMeta {
    pub device_id: String,
    pub device_model: String,
    pub device_os: String,
}

pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionRegistry>,
    mailer: Arc<dyn MailDispatch>,
    passwords: PasswordEngine,
    tokens: TokenIssuer,
    otp: OtpChallenge,
    /// Hash burned on lookups that miss, so "unknown email" and "wrong
    /// password" take the same time.
    dummy_password_hash: String,
}

impl AuthService {
    /// Wire the orchestrator from its collaborators.
    ///
    /// # Errors
    /// Returns an error if the dummy password hash cannot be produced.
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionRegistry>,
        mailer: Arc<dyn MailDispatch>,
    ) -> Result<Self, AuthError> {
        let passwords = PasswordEngine;
        let dummy_password_hash = passwords.hash("aliro-dummy-credential")?;
        Ok(Self {
            users,
            sessions,
            mailer,
            passwords,
            tokens: TokenIssuer::new(config.token_secret(), config.access_token_ttl_seconds()),
            otp: OtpChallenge::new(config.otp_ttl_seconds()),
            dummy_password_hash,
        })
    }

    #[must_use]
    pub const fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Email/password login for a specific device.
    ///
    /// Unverified accounts and unknown devices get a fresh OTP challenge
    /// instead of tokens. Unknown emails and wrong passwords fail with the
    /// same error.
    ///
    /// # Errors
    /// `InvalidCredentials`, or an OTP/mail/storage failure.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device: &DeviceMeta,
    ) -> Result<AuthResult, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            // Burn a verification anyway so the miss is not observable by timing.
            let _ = self.passwords.verify(password, &self.dummy_password_hash);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self
            .sessions
            .find_by_user_and_device(user.id, &device.device_id)
            .await?;

        // New or unverified devices must pass the OTP step-up first.
        if !user.email_verified || session.is_none() {
            self.issue_and_dispatch_otp(user).await?;
            return Ok(AuthResult::need_otp());
        }

        let result = self.issue_tokens(&user, device).await?;
        info!(user_id = %user.id, device_id = %device.device_id, "login succeeded");
        Ok(result)
    }

    /// Create a pending account and dispatch its first OTP. No session is
    /// created until a device passes verification.
    ///
    /// # Errors
    /// `DuplicateEmail` when the address is taken.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let password_hash = self.passwords.hash(password)?;
        let issue = self.otp.generate();
        let user = User::new(email.clone(), password_hash, issue.code.clone(), issue.expires_at);

        // Uniqueness is enforced by the store insert, not a pre-check race.
        self.users.insert(&user).await?;
        self.mailer
            .send(&email, &issue.code)
            .map_err(AuthError::Internal)?;
        info!(user_id = %user.id, "registered pending account");
        Ok(())
    }

    /// Whether an email is already registered (pre-signup check).
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn check_email_duplicate(&self, email: &str) -> Result<bool, AuthError> {
        let email = normalize_email(email);
        Ok(self.users.find_by_email(&email).await?.is_some())
    }

    /// Verify an OTP and register the submitting device: activates the
    /// account, clears the challenge, and issues tokens bound to the device.
    ///
    /// # Errors
    /// `UserNotFound`, `OtpExpired`, `OtpMismatch`.
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        device: &DeviceMeta,
    ) -> Result<AuthResult, AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.otp.verify(&user, code)?;

        let user = user.with_verified_email().with_cleared_otp();
        self.users.update(&user).await?;

        let result = self.issue_tokens(&user, device).await?;
        info!(user_id = %user.id, device_id = %device.device_id, "otp verified, device registered");
        Ok(result)
    }

    /// Flag-only verification used by the email-confirmation flow; no
    /// device is registered and no tokens are issued.
    ///
    /// # Errors
    /// `UserNotFound`, `OtpExpired`, `OtpMismatch`.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.otp.verify(&user, code)?;

        let user = user.with_verified_email().with_cleared_otp();
        self.users.update(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(())
    }

    /// Re-issue and re-dispatch a fresh OTP, replacing any unexpired code
    /// so at most one challenge is active per user.
    ///
    /// # Errors
    /// `UserNotFound`.
    pub async fn retry_otp(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.issue_and_dispatch_otp(user).await
    }

    /// Exchange a refresh token for a new access token, rotating the
    /// refresh token on the same session. The presented token stops
    /// resolving the moment the rotation wins.
    ///
    /// # Errors
    /// `SessionNotFound` when the token does not resolve or loses a
    /// concurrent rotation.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let presented_hash = TokenIssuer::hash_opaque_token(refresh_token.trim());
        let session = self
            .sessions
            .find_by_refresh_token(&presented_hash)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let (access_token, expires_in) = self
            .tokens
            .sign_access_token(session.user_id, Some(&session.device_id))?;
        let next_refresh = TokenIssuer::issue_opaque_token()?;
        let next_hash = TokenIssuer::hash_opaque_token(&next_refresh);

        // Compare-and-swap: a concurrent refresh that already rotated this
        // session makes the presented token stale, and this caller loses.
        self.sessions
            .rotate_refresh_token(session.id, &presented_hash, &next_hash)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        Ok(AuthResult::success(access_token, expires_in, next_refresh))
    }

    /// Remove the caller's own session.
    ///
    /// # Errors
    /// `SessionNotFound` when no session exists for the device.
    pub async fn logout(&self, user_id: Uuid, device_id: &str) -> Result<(), AuthError> {
        let session = self
            .sessions
            .find_by_user_and_device(user_id, device_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        self.sessions.remove(session.id).await?;
        info!(user_id = %user_id, device_id = %device_id, "session removed");
        Ok(())
    }

    /// Step-up removal of another device's session. Requires a fresh OTP
    /// match against the acting user; revokes the target's refresh token
    /// immediately.
    ///
    /// # Errors
    /// `OtpExpired`/`OtpMismatch` on a failed step-up, `DeviceConflict`
    /// when the target is the caller's own device, `SessionNotFound` when
    /// the target device has no session.
    pub async fn remove_other_device(
        &self,
        user: &User,
        current_session: &UserSession,
        target_device_id: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        self.otp.verify(user, code)?;

        if target_device_id == current_session.device_id {
            return Err(AuthError::DeviceConflict);
        }

        let target = self
            .sessions
            .find_by_user_and_device(user.id, target_device_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        self.sessions.remove(target.id).await?;

        // The step-up code is single-use.
        let user = user.clone().with_cleared_otp();
        self.users.update(&user).await?;
        info!(user_id = %user.id, device_id = %target_device_id, "other device removed");
        Ok(())
    }

    /// Sessions for the device list, oldest first.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn list_devices(&self, user_id: Uuid) -> Result<Vec<UserSession>, AuthError> {
        self.sessions.list_by_user(user_id).await
    }

    async fn issue_and_dispatch_otp(&self, user: User) -> Result<(), AuthError> {
        let issue = self.otp.generate();
        let user = user.with_otp(issue.code.clone(), issue.expires_at);
        self.users.update(&user).await?;
        self.mailer
            .send(&user.email, &issue.code)
            .map_err(AuthError::Internal)
    }

    /// Mint access + refresh tokens and persist the session before
    /// returning anything: a failed session write means no tokens leave
    /// this method.
    async fn issue_tokens(&self, user: &User, device: &DeviceMeta) -> Result<AuthResult, AuthError> {
        let (access_token, expires_in) = self
            .tokens
            .sign_access_token(user.id, Some(&device.device_id))?;
        let refresh_token = TokenIssuer::issue_opaque_token()?;

        self.sessions
            .upsert(NewSession {
                user_id: user.id,
                device_id: &device.device_id,
                device_model: &device.device_model,
                device_os: &device.device_os,
                refresh_token_hash: TokenIssuer::hash_opaque_token(&refresh_token),
            })
            .await?;

        Ok(AuthResult::success(access_token, expires_in, refresh_token))
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }
}
