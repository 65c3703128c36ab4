//! API handlers and shared utilities for Aliro.
//!
//! Route handlers stay thin: validate the payload shape, call the auth
//! core, and map its error taxonomy onto protocol statuses.

pub mod auth;
pub mod devices;
pub mod health;
pub mod root;

use axum::http::StatusCode;
use regex::Regex;
use tracing::error;

use crate::auth::AuthError;

/// Lightweight email sanity check used by handlers before touching storage.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// One-time passcodes are exactly six digits.
pub fn valid_otp(code: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").is_ok_and(|re| re.is_match(code))
}

/// Map a core error from a public flow onto a protocol response.
///
/// Internal faults are logged here and surfaced as an opaque 500; the
/// taxonomy variants pass through with their own message.
pub(crate) fn auth_error_response(err: &AuthError) -> (StatusCode, String) {
    if err.is_internal() {
        error!("auth flow failed: {err:#}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        );
    }

    let status = match err {
        AuthError::InvalidCredentials
        | AuthError::OtpExpired
        | AuthError::OtpMismatch
        | AuthError::SessionNotFound
        | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
        AuthError::DuplicateEmail => StatusCode::CONFLICT,
        AuthError::UserNotFound | AuthError::DeviceConflict => StatusCode::BAD_REQUEST,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Map a guard failure onto a response. Guarded routes never explain which
/// part of the check failed.
pub(crate) fn guard_error_response(err: &AuthError) -> (StatusCode, String) {
    if err.is_internal() {
        error!("request authentication failed: {err:#}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        );
    }
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
}
