//! In-memory store for local dev and tests.
//!
//! A single mutex guards both tables, which trivially provides the atomic
//! upsert and compare-and-swap semantics the contracts require. Production
//! deployments use the `sqlx` implementations in [`super::repo`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    error::AuthError,
    models::{User, UserSession},
    store::{CredentialStore, NewSession, SessionRegistry},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, UserSession>,
}

impl Tables {
    fn session_by_user_and_device(&self, user_id: Uuid, device_id: &str) -> Option<&UserSession> {
        self.sessions
            .values()
            .find(|session| session.user_id == user_id && session.device_id == device_id)
    }
}

/// Shared in-memory store; clone-free, wrap in `Arc` to share.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AuthError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|row| row.email == user.email) {
            return Err(AuthError::DuplicateEmail);
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), AuthError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user.id) {
            return Err(AuthError::UserNotFound);
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.len() as u64)
    }
}

#[async_trait]
impl SessionRegistry for MemoryStore {
    async fn upsert(&self, session: NewSession<'_>) -> Result<UserSession, AuthError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(id) = tables
            .session_by_user_and_device(session.user_id, session.device_id)
            .map(|existing| existing.id)
        {
            // Re-registration replaces the token and metadata in place.
            let existing = tables
                .sessions
                .get_mut(&id)
                .ok_or(AuthError::SessionNotFound)?;
            existing.device_model = session.device_model.to_string();
            existing.device_os = session.device_os.to_string();
            existing.refresh_token_hash = session.refresh_token_hash;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = UserSession {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            device_id: session.device_id.to_string(),
            device_model: session.device_model.to_string(),
            device_os: session.device_os.to_string(),
            refresh_token_hash: session.refresh_token_hash,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn rotate_refresh_token(
        &self,
        session_id: Uuid,
        old_hash: &[u8],
        new_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError> {
        let mut tables = self.tables.lock().await;
        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        if session.refresh_token_hash != old_hash {
            // A concurrent rotation already won; this caller loses.
            return Ok(None);
        }
        session.refresh_token_hash = new_hash.to_vec();
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn find_by_user_and_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<UserSession>, AuthError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .session_by_user_and_device(user_id, device_id)
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .find(|session| session.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<UserSession>, AuthError> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<UserSession> = tables
            .sessions
            .values()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.created_at);
        Ok(sessions)
    }

    async fn remove(&self, session_id: Uuid) -> Result<bool, AuthError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.sessions.remove(&session_id).is_some())
    }
}
