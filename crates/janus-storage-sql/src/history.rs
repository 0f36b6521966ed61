//! `PostgreSQL` implementation of the password history provider.

use async_trait::async_trait;
use janus_model::PasswordHistoryEntry;
use janus_storage::PasswordHistoryProvider;
use janus_storage::error::StorageResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::HistoryRow;
use crate::error::from_sqlx_error;

/// `PostgreSQL` password history provider.
pub struct PgPasswordHistoryProvider {
    pool: PgPool,
}

impl PgPasswordHistoryProvider {
    /// Creates a new `PostgreSQL` password history provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordHistoryProvider for PgPasswordHistoryProvider {
    async fn append(&self, entry: &PasswordHistoryEntry) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO password_history (user_id, password_hash, created_at)
            VALUES ($1, $2, $3)",
        )
        .bind(entry.user_id)
        .bind(&entry.password_hash)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn recent(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<PasswordHistoryEntry>> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;

        let rows: Vec<HistoryRow> = sqlx::query_as(
            r"SELECT * FROM password_history WHERE user_id = $1
            ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(rows.into_iter().map(PasswordHistoryEntry::from).collect())
    }

    async fn prune(&self, user_id: Uuid, keep: usize) -> StorageResult<u64> {
        #[allow(clippy::cast_possible_wrap)]
        let keep = keep as i64;

        let result = sqlx::query(
            r"DELETE FROM password_history
            WHERE user_id = $1 AND created_at NOT IN (
                SELECT created_at FROM password_history
                WHERE user_id = $1
                ORDER BY created_at DESC LIMIT $2
            )",
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
