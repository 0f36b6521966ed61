//! `PostgreSQL` implementation of the scope registry.

use async_trait::async_trait;
use janus_storage::ScopeProvider;
use janus_storage::error::StorageResult;
use sqlx::PgPool;

use crate::error::from_sqlx_error;

/// `PostgreSQL` scope registry provider.
pub struct PgScopeProvider {
    pool: PgPool,
}

impl PgScopeProvider {
    /// Creates a new `PostgreSQL` scope provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeProvider for PgScopeProvider {
    async fn all_exist(&self, scopes: &[String]) -> StorageResult<bool> {
        if scopes.is_empty() {
            return Ok(true);
        }

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM oauth2_scopes WHERE name = ANY($1)")
                .bind(scopes)
                .fetch_one(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        #[allow(clippy::cast_possible_wrap)]
        Ok(count == scopes.len() as i64)
    }
}
