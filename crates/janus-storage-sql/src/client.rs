//! `PostgreSQL` implementation of the OAuth2 client provider.

use async_trait::async_trait;
use chrono::Utc;
use janus_model::OAuth2Client;
use janus_storage::ClientProvider;
use janus_storage::error::{StorageError, StorageResult};
use sqlx::PgPool;

use crate::entities::{ClientRow, grant_types_to_json};
use crate::error::{duplicate_or, from_sqlx_error};

/// `PostgreSQL` OAuth2 client provider.
pub struct PgClientProvider {
    pool: PgPool,
}

impl PgClientProvider {
    /// Creates a new `PostgreSQL` client provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientProvider for PgClientProvider {
    async fn create(&self, client: &OAuth2Client) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO oauth2_clients (
                id, client_id, client_secret_hash, name, description,
                redirect_uris, allowed_scopes, grant_types,
                is_public, is_active, owner_user_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(client.id)
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.description)
        .bind(sqlx::types::Json(&client.redirect_uris))
        .bind(sqlx::types::Json(&client.allowed_scopes))
        .bind(sqlx::types::Json(grant_types_to_json(&client.grant_types)))
        .bind(client.is_public)
        .bind(client.is_active)
        .bind(client.owner_user_id)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "OAuth2Client", "client_id"))?;

        Ok(())
    }

    async fn get_by_client_id(&self, client_id: &str) -> StorageResult<Option<OAuth2Client>> {
        let row: Option<ClientRow> =
            sqlx::query_as("SELECT * FROM oauth2_clients WHERE client_id = $1")
                .bind(client_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(OAuth2Client::from))
    }

    async fn update(&self, client: &OAuth2Client) -> StorageResult<()> {
        let result = sqlx::query(
            r"UPDATE oauth2_clients SET
                client_secret_hash = $2, name = $3, description = $4,
                redirect_uris = $5, allowed_scopes = $6, grant_types = $7,
                is_public = $8, is_active = $9, updated_at = $10
            WHERE client_id = $1",
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.description)
        .bind(sqlx::types::Json(&client.redirect_uris))
        .bind(sqlx::types::Json(&client.allowed_scopes))
        .bind(sqlx::types::Json(grant_types_to_json(&client.grant_types)))
        .bind(client.is_public)
        .bind(client.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found_by_key("OAuth2Client"));
        }

        Ok(())
    }

    async fn deactivate(&self, client_id: &str) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE oauth2_clients SET is_active = FALSE, updated_at = $2 WHERE client_id = $1",
        )
        .bind(client_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found_by_key("OAuth2Client"));
        }

        Ok(())
    }
}
