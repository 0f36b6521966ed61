//! `PostgreSQL` implementation of the session store.
//!
//! The durable backend: sessions live in a table, expiry is enforced by the
//! callers' validity checks plus a background sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::Session;
use janus_storage::SessionStore;
use janus_storage::error::{StorageError, StorageResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::SessionRow;
use crate::error::{duplicate_or, from_sqlx_error};

/// `PostgreSQL` session store.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new `PostgreSQL` session store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO sessions (
                id, user_id, token, ip_address, user_agent,
                expires_at, last_activity_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "Session", "token"))?;

        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> StorageResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(row.map(Session::from))
    }

    async fn get_by_user(&self, user_id: Uuid) -> StorageResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn update(&self, session: &Session) -> StorageResult<()> {
        // Last-writer-wins on expires_at: concurrent renewals both extend.
        let result = sqlx::query(
            r"UPDATE sessions SET
                expires_at = $2, last_activity_at = $3
            WHERE id = $1",
        )
        .bind(session.id)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Session", session.id));
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_active(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE expires_at > $1")
                .bind(now)
                .fetch_one(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }
}
