//! `PostgreSQL` implementation of the consent ledger.

use async_trait::async_trait;
use janus_model::Consent;
use janus_storage::ConsentProvider;
use janus_storage::error::StorageResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ConsentRow;
use crate::error::from_sqlx_error;

/// `PostgreSQL` consent ledger provider.
pub struct PgConsentProvider {
    pool: PgPool,
}

impl PgConsentProvider {
    /// Creates a new `PostgreSQL` consent provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConsentProvider for PgConsentProvider {
    async fn upsert(&self, consent: &Consent) -> StorageResult<()> {
        // Replacement semantics: the stored scope set becomes exactly the
        // newly granted one.
        sqlx::query(
            r"INSERT INTO oauth2_consents (user_id, client_id, scopes, granted_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, client_id) DO UPDATE SET
                scopes = EXCLUDED.scopes,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(consent.user_id)
        .bind(&consent.client_id)
        .bind(sqlx::types::Json(&consent.scopes))
        .bind(consent.granted_at)
        .bind(consent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, user_id: Uuid, client_id: &str) -> StorageResult<Option<Consent>> {
        let row: Option<ConsentRow> = sqlx::query_as(
            "SELECT * FROM oauth2_consents WHERE user_id = $1 AND client_id = $2",
        )
        .bind(user_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(row.map(Consent::from))
    }

    async fn revoke(&self, user_id: Uuid, client_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM oauth2_consents WHERE user_id = $1 AND client_id = $2")
            .bind(user_id)
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }
}
