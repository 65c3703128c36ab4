//! Repository contracts for users and per-device sessions.
//!
//! The core owns the mutation rules; the storage engine behind these traits
//! only has to provide atomic upsert and compare-and-swap semantics on the
//! `(user_id, device_id)` key. Production uses the `sqlx` implementations
//! in [`super::repo`]; tests and local dev use [`super::memory`].

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    error::AuthError,
    models::{User, UserSession},
};

/// Fields needed to register (or re-register) a device session.
#[derive(Clone, Debug)]
pub struct NewSession<'a> {
    pub user_id: Uuid,
    pub device_id: &'a str,
    pub device_model: &'a str,
    pub device_os: &'a str,
    pub refresh_token_hash: Vec<u8>,
}

/// User records: password hash, OTP state, and verification flags.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Insert a new user. The email uniqueness check is the store's unique
    /// index, not a check-then-insert race.
    ///
    /// # Errors
    /// `DuplicateEmail` when the email is already registered.
    async fn insert(&self, user: &User) -> Result<(), AuthError>;

    /// Persist a full user snapshot produced by a `with_*` transition.
    async fn update(&self, user: &User) -> Result<(), AuthError>;

    /// Number of user rows; used by duplicate-registration tests.
    async fn count(&self) -> Result<u64, AuthError>;
}

/// Per-device session records and refresh-token rotation.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Create the session for `(user_id, device_id)` or, when the device is
    /// already registered, replace its refresh-token hash and metadata in
    /// place. Never produces a second row for the same device.
    async fn upsert(&self, session: NewSession<'_>) -> Result<UserSession, AuthError>;

    /// Atomically swap the refresh-token hash, guarded by the previous
    /// hash. Returns `None` when the guard no longer matches, so exactly
    /// one of two concurrent rotations wins.
    async fn rotate_refresh_token(
        &self,
        session_id: Uuid,
        old_hash: &[u8],
        new_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError>;

    async fn find_by_user_and_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<UserSession>, AuthError>;

    /// Resolve a presented refresh token by its hash.
    async fn find_by_refresh_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError>;

    /// Sessions for a user, oldest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<UserSession>, AuthError>;

    /// Delete a session. Returns whether a row was removed.
    async fn remove(&self, session_id: Uuid) -> Result<bool, AuthError>;
}
