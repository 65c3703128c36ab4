//! Error taxonomy for the auth core.
//!
//! Every variant is raised at the point of detection and surfaced unmodified
//! to the HTTP boundary, which maps it to a protocol status. Nothing here is
//! retried internally; user-triggered retries are their own use cases.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad email or password. Deliberately never says which.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("user not found")]
    UserNotFound,

    #[error("one-time passcode has expired")]
    OtpExpired,

    #[error("one-time passcode does not match")]
    OtpMismatch,

    #[error("session not found")]
    SessionNotFound,

    /// Bad signature, malformed structure, or expired access token.
    #[error("access token is invalid")]
    TokenInvalid,

    /// Removing the caller's own device through the "other device" path.
    #[error("target device is the current device")]
    DeviceConflict,

    /// Storage or signing failure. Fatal to the current request only.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// True when the error should be logged as a server fault rather than
    /// reported as a client mistake.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
