//! `PostgreSQL` implementations of the store contracts.
//!
//! Schema lives in `migrations/`. The `(user_id, device_id)` unique index
//! is the serialization boundary for concurrent logins, and refresh-token
//! rotation is a guarded `UPDATE` so two concurrent refreshes cannot both
//! succeed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    error::AuthError,
    models::{User, UserSession, UserStatus},
    store::{CredentialStore, NewSession, SessionRegistry},
};

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Clone)]
pub struct PgSessionRegistry {
    pool: PgPool,
}

impl PgSessionRegistry {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    let status: String = row.get("status");
    User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        otp_code: row.get("otp_code"),
        otp_expires_at: row.get("otp_expires_at"),
        email_verified: row.get("email_verified"),
        status: UserStatus::parse(&status),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn session_from_row(row: &PgRow) -> UserSession {
    UserSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        device_id: row.get("device_id"),
        device_model: row.get("device_model"),
        device_os: row.get("device_os"),
        refresh_token_hash: row.get("refresh_token_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, otp_code, otp_expires_at, \
     email_verified, status, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, device_id, device_model, device_os, \
     refresh_token_hash, created_at, updated_at";

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;
        Ok(row.map(|row| user_from_row(&row)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;
        Ok(row.map(|row| user_from_row(&row)))
    }

    async fn insert(&self, user: &User) -> Result<(), AuthError> {
        let query = r"
            INSERT INTO users
                (id, email, password_hash, otp_code, otp_expires_at,
                 email_verified, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.otp_code)
            .bind(user.otp_expires_at)
            .bind(user.email_verified)
            .bind(user.status.as_str())
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::DuplicateEmail),
            Err(err) => Err(anyhow::Error::from(err)
                .context("failed to insert user")
                .into()),
        }
    }

    async fn update(&self, user: &User) -> Result<(), AuthError> {
        let query = r"
            UPDATE users
            SET password_hash = $2,
                otp_code = $3,
                otp_expires_at = $4,
                email_verified = $5,
                status = $6,
                updated_at = $7
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user.id)
            .bind(&user.password_hash)
            .bind(&user.otp_code)
            .bind(user.otp_expires_at)
            .bind(user.email_verified)
            .bind(user.status.as_str())
            .bind(user.updated_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update user")?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, AuthError> {
        let query = "SELECT COUNT(*) AS count FROM users";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count users")?;
        let count: i64 = row.get("count");
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl SessionRegistry for PgSessionRegistry {
    async fn upsert(&self, session: NewSession<'_>) -> Result<UserSession, AuthError> {
        // ON CONFLICT keeps one row per (user_id, device_id): re-registering
        // a device replaces its token hash and metadata in place.
        let query = format!(
            r"
            INSERT INTO user_sessions
                (id, user_id, device_id, device_model, device_os, refresh_token_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, device_id) DO UPDATE
            SET device_model = EXCLUDED.device_model,
                device_os = EXCLUDED.device_os,
                refresh_token_hash = EXCLUDED.refresh_token_hash,
                updated_at = NOW()
            RETURNING {SESSION_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(session.user_id)
            .bind(session.device_id)
            .bind(session.device_model)
            .bind(session.device_os)
            .bind(&session.refresh_token_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert session")?;
        Ok(session_from_row(&row))
    }

    async fn rotate_refresh_token(
        &self,
        session_id: Uuid,
        old_hash: &[u8],
        new_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError> {
        // Guarded by the previous hash: the loser of a concurrent rotation
        // matches zero rows and gets None.
        let query = format!(
            r"
            UPDATE user_sessions
            SET refresh_token_hash = $3,
                updated_at = NOW()
            WHERE id = $1
              AND refresh_token_hash = $2
            RETURNING {SESSION_COLUMNS}
        "
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(session_id)
            .bind(old_hash)
            .bind(new_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh token")?;
        Ok(row.map(|row| session_from_row(&row)))
    }

    async fn find_by_user_and_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<UserSession>, AuthError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE user_id = $1 AND device_id = $2"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session by device")?;
        Ok(row.map(|row| session_from_row(&row)))
    }

    async fn find_by_refresh_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<UserSession>, AuthError> {
        let query =
            format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE refresh_token_hash = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session by refresh token")?;
        Ok(row.map(|row| session_from_row(&row)))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<UserSession>, AuthError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE user_id = $1 ORDER BY created_at"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list sessions")?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn remove(&self, session_id: Uuid) -> Result<bool, AuthError> {
        let query = "DELETE FROM user_sessions WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }
}
