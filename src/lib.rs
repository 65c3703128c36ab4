//! # Aliro (Device-bound Authentication Service)
//!
//! `aliro` authenticates end users by email/password and binds every
//! session to a specific device, so one account can stay logged in on
//! several devices at once.
//!
//! ## Tokens
//!
//! Successful flows issue a short-lived HS256-signed access token (claims
//! `sub`, `deviceId`, `iat`, `exp`) plus a long-lived opaque refresh token.
//! Refresh tokens rotate on every use: presenting one both proves the
//! session and invalidates that value, and only a SHA-256 hash of it is
//! ever stored.
//!
//! ## Device trust (OTP step-up)
//!
//! New or unverified devices never get tokens directly. Login answers with
//! `NEED_OTP`, a 6-digit passcode goes out through the mail collaborator,
//! and verifying it both activates the account and registers the device.
//! Removing *another* device requires a fresh OTP even with a valid access
//! token.
//!
//! ## Layout
//!
//! - [`auth`] — the credential/session core: passcode lifecycle, token
//!   signing and rotation, per-device session bookkeeping, orchestration.
//! - [`api`] — axum HTTP surface over the core.
//! - [`cli`] — clap command line and telemetry bootstrap.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
