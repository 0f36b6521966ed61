//! `PostgreSQL` implementation of the audit store.

use async_trait::async_trait;
use janus_core::AuditEvent;
use janus_storage::AuditStore;
use janus_storage::error::StorageResult;
use sqlx::PgPool;

use crate::error::from_sqlx_error;

/// `PostgreSQL` append-only audit store.
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    /// Creates a new `PostgreSQL` audit store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, event: &AuditEvent) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO audit_log (
                id, user_id, action, resource, ip_address, user_agent, detail, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.action.as_str())
        .bind(&event.resource)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.detail)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }
}
