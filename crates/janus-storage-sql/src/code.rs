//! `PostgreSQL` implementation of the authorization code provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::AuthorizationCode;
use janus_storage::CodeProvider;
use janus_storage::error::StorageResult;
use sqlx::PgPool;

use crate::entities::CodeRow;
use crate::error::from_sqlx_error;

/// `PostgreSQL` authorization code provider.
pub struct PgCodeProvider {
    pool: PgPool,
}

impl PgCodeProvider {
    /// Creates a new `PostgreSQL` code provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeProvider for PgCodeProvider {
    async fn create(&self, code: &AuthorizationCode) -> StorageResult<()> {
        let method = code.code_challenge_method.map(|m| m.as_str().to_string());

        sqlx::query(
            r"INSERT INTO oauth2_authorization_codes (
                id, code, client_id, user_id, redirect_uri, scopes,
                code_challenge, code_challenge_method, expires_at, used, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(code.id)
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(sqlx::types::Json(&code.scopes))
        .bind(&code.code_challenge)
        .bind(method)
        .bind(code.expires_at)
        .bind(code.used)
        .bind(code.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        let row: Option<CodeRow> =
            sqlx::query_as("SELECT * FROM oauth2_authorization_codes WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(AuthorizationCode::from))
    }

    async fn redeem(&self, code: &str) -> StorageResult<bool> {
        // The one-shot transition. Exactly one concurrent redeemer observes
        // rows_affected = 1; everyone else gets 0.
        let result = sqlx::query(
            "UPDATE oauth2_authorization_codes SET used = TRUE WHERE code = $1 AND used = FALSE",
        )
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM oauth2_authorization_codes WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
