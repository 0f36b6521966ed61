//! `PostgreSQL` implementation of the user storage provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::{TwoFactor, User};
use janus_storage::UserProvider;
use janus_storage::error::{StorageError, StorageResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{TwoFactorRow, UserRow};
use crate::error::{duplicate_or, from_sqlx_error};

/// `PostgreSQL` user storage provider.
pub struct PgUserProvider {
    pool: PgPool,
}

impl PgUserProvider {
    /// Creates a new `PostgreSQL` user provider.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserProvider for PgUserProvider {
    async fn create(&self, user: &User) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO users (
                id, email, name, email_verified, password_hash, password_changed_at,
                is_active, is_locked, failed_attempts, locked_until, last_login_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.email_verified)
        .bind(&user.password_hash)
        .bind(user.password_changed_at)
        .bind(user.is_active)
        .bind(user.is_locked)
        .bind(user.failed_attempts)
        .bind(user.locked_until)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, "User", "email"))?;

        Ok(())
    }

    async fn update(&self, user: &User) -> StorageResult<()> {
        let result = sqlx::query(
            r"UPDATE users SET
                email = $2, name = $3, email_verified = $4, is_active = $5,
                updated_at = $6
            WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.email_verified)
        .bind(user.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", user.id));
        }

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(row.map(User::from))
    }

    async fn get_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(row.map(User::from))
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r"UPDATE users SET password_hash = $2, password_changed_at = $3, updated_at = $4
            WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(changed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", id));
        }

        Ok(())
    }

    async fn increment_failed_attempts(&self, id: Uuid) -> StorageResult<i32> {
        let (count,): (i32,) = sqlx::query_as(
            r"UPDATE users SET failed_attempts = failed_attempts + 1
            WHERE id = $1
            RETURNING failed_attempts",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(from_sqlx_error)?
        .ok_or(StorageError::not_found("User", id))?;

        Ok(count)
    }

    async fn reset_failed_attempts(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query("UPDATE users SET failed_attempts = 0 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", id));
        }

        Ok(())
    }

    async fn lock(&self, id: Uuid, until: DateTime<Utc>) -> StorageResult<()> {
        // Idempotent: every writer that crossed the threshold writes the
        // same state.
        let result =
            sqlx::query("UPDATE users SET is_locked = TRUE, locked_until = $2 WHERE id = $1")
                .bind(id)
                .bind(until)
                .execute(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", id));
        }

        Ok(())
    }

    async fn clear_lock(&self, id: Uuid) -> StorageResult<()> {
        let result = sqlx::query(
            r"UPDATE users SET is_locked = FALSE, locked_until = NULL, failed_attempts = 0
            WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("User", id));
        }

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn get_two_factor(&self, user_id: Uuid) -> StorageResult<Option<TwoFactor>> {
        let row: Option<TwoFactorRow> =
            sqlx::query_as("SELECT * FROM two_factor WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        Ok(row.map(TwoFactor::from))
    }

    async fn upsert_two_factor(&self, enrollment: &TwoFactor) -> StorageResult<()> {
        sqlx::query(
            r"INSERT INTO two_factor (
                id, user_id, secret, enabled, enabled_at, backup_code_hashes, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                secret = EXCLUDED.secret,
                enabled = EXCLUDED.enabled,
                enabled_at = EXCLUDED.enabled_at,
                backup_code_hashes = EXCLUDED.backup_code_hashes",
        )
        .bind(enrollment.id)
        .bind(enrollment.user_id)
        .bind(&enrollment.secret)
        .bind(enrollment.enabled)
        .bind(enrollment.enabled_at)
        .bind(sqlx::types::Json(&enrollment.backup_code_hashes))
        .bind(enrollment.created_at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn enable_two_factor(&self, user_id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE two_factor SET enabled = TRUE, enabled_at = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("TwoFactor", user_id));
        }

        Ok(())
    }

    async fn disable_two_factor(&self, user_id: Uuid) -> StorageResult<()> {
        sqlx::query("UPDATE two_factor SET enabled = FALSE, enabled_at = NULL WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(from_sqlx_error)?;

        Ok(())
    }

    async fn update_backup_codes(&self, user_id: Uuid, hashes: &[String]) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE two_factor SET backup_code_hashes = $2 WHERE user_id = $1")
                .bind(user_id)
                .bind(sqlx::types::Json(hashes))
                .execute(&self.pool)
                .await
                .map_err(from_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("TwoFactor", user_id));
        }

        Ok(())
    }
}
