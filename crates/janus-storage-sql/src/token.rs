//! `PostgreSQL` implementation of the token record provider.
//!
//! Access tokens are signed JWTs; only their SHA-256 fingerprints are
//! stored. Refresh tokens are opaque and likewise stored hashed. Deleting an
//! access token row is what revokes it: verification requires the row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::{AccessTokenRecord, RefreshTokenRecord};
use janus_storage::TokenProvider;
use janus_storage::error::StorageResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{AccessTokenRow, RefreshTokenRow};
use crate::error::from_sqlx_error;

/// `PostgreSQL` token record provider.
pub struct PgTokenProvider {
    pool: PgPool,
}

impl PgTokenProvider {
    /// Creates a new `PostgreSQL` token provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenProvider for PgTokenProvider {
    async fn create_access_token(&self, token: &AccessTokenRecord) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO oauth2_access_tokens (
                id, token_hash, client_id, user_id, scopes, auth_code_id,
                expires_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(token.id)
        .bind(&token.token_hash)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(sqlx::types::Json(&token.scopes))
        .bind(token.auth_code_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get_access_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<AccessTokenRecord>> {
        let row: Option<AccessTokenRow> =
            sqlx::query_as("SELECT * FROM oauth2_access_tokens WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(AccessTokenRecord::from))
    }

    async fn delete_access_token_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM oauth2_access_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_refresh_token(&self, token: &RefreshTokenRecord) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO oauth2_refresh_tokens (
                id, token_hash, access_token_id, auth_code_id, client_id, user_id,
                scopes, expires_at, revoked, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(token.id)
        .bind(&token.token_hash)
        .bind(token.access_token_id)
        .bind(token.auth_code_id)
        .bind(&token.client_id)
        .bind(token.user_id)
        .bind(sqlx::types::Json(&token.scopes))
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenRow> =
            sqlx::query_as("SELECT * FROM oauth2_refresh_tokens WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn revoke_refresh_token_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        let result = sqlx::query(
            r"UPDATE oauth2_refresh_tokens SET revoked = TRUE
            WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_by_auth_code(&self, auth_code_id: Uuid) -> StorageResult<u64> {
        let access = sqlx::query("DELETE FROM oauth2_access_tokens WHERE auth_code_id = $1")
            .bind(auth_code_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        let refresh = sqlx::query(
            r"UPDATE oauth2_refresh_tokens SET revoked = TRUE
            WHERE auth_code_id = $1 AND revoked = FALSE",
        )
        .bind(auth_code_id)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(access.rows_affected() + refresh.rows_affected())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let access = sqlx::query("DELETE FROM oauth2_access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        let refresh = sqlx::query(
            r"UPDATE oauth2_refresh_tokens SET revoked = TRUE
            WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(access.rows_affected() + refresh.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let access = sqlx::query("DELETE FROM oauth2_access_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        let refresh = sqlx::query("DELETE FROM oauth2_refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(access.rows_affected() + refresh.rows_affected())
    }
}
