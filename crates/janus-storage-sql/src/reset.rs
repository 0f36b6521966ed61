//! `PostgreSQL` implementation of the reset ticket provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::PasswordResetTicket;
use janus_storage::ResetTicketProvider;
use janus_storage::error::{StorageError, StorageResult};
use sqlx::PgPool;

use crate::entities::ResetTicketRow;
use crate::error::from_sqlx_error;

/// `PostgreSQL` password reset ticket provider.
pub struct PgResetTicketProvider {
    pool: PgPool,
}

impl PgResetTicketProvider {
    /// Creates a new `PostgreSQL` reset ticket provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetTicketProvider for PgResetTicketProvider {
    async fn create(&self, ticket: &PasswordResetTicket) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO password_reset_tokens (
                id, user_id, email, token, expires_at, used, used_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(ticket.id)
        .bind(ticket.user_id)
        .bind(&ticket.email)
        .bind(&ticket.token)
        .bind(ticket.expires_at)
        .bind(ticket.used)
        .bind(ticket.used_at)
        .bind(ticket.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> StorageResult<Option<PasswordResetTicket>> {
        let row: Option<ResetTicketRow> =
            sqlx::query_as("SELECT * FROM password_reset_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(PasswordResetTicket::from))
    }

    async fn mark_used(&self, token: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE, used_at = $2 WHERE token = $1",
        )
        .bind(token)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found_by_key("PasswordResetTicket"));
        }

        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
