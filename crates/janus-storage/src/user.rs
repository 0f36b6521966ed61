//! User storage provider trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::{TwoFactor, User};
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for principal and two-factor enrollment storage.
///
/// Counter and lock transitions are column-level operations so that
/// concurrent logins never clobber each other through whole-record writes.
#[async_trait]
pub trait UserProvider: Send + Sync {
    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` if the email is taken.
    async fn create(&self, user: &User) -> StorageResult<()>;

    /// Updates an existing user (whole-record, for profile edits).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user doesn't exist.
    async fn update(&self, user: &User) -> StorageResult<()>;

    /// Gets a user by ID.
    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<User>>;

    /// Gets a user by email.
    async fn get_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// Replaces the password hash and change timestamp, nothing else.
    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Atomically increments the failed-attempt counter.
    ///
    /// Returns the post-increment count. This is a single conditional
    /// update at the backend, never a read-modify-write.
    async fn increment_failed_attempts(&self, id: Uuid) -> StorageResult<i32>;

    /// Resets the failed-attempt counter to zero (column update only).
    async fn reset_failed_attempts(&self, id: Uuid) -> StorageResult<()>;

    /// Marks the account locked until the given instant.
    ///
    /// Idempotent: concurrent writers racing past the attempt threshold all
    /// agree on this state.
    async fn lock(&self, id: Uuid, until: DateTime<Utc>) -> StorageResult<()>;

    /// Clears an expired lock and zeroes the counter.
    async fn clear_lock(&self, id: Uuid) -> StorageResult<()>;

    /// Updates only `last_login_at`.
    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StorageResult<()>;

    // === Two-factor enrollment ===

    /// Gets the two-factor enrollment for a user, if any.
    async fn get_two_factor(&self, user_id: Uuid) -> StorageResult<Option<TwoFactor>>;

    /// Creates or replaces the enrollment for a user.
    async fn upsert_two_factor(&self, enrollment: &TwoFactor) -> StorageResult<()>;

    /// Enables the enrollment, stamping `enabled_at`.
    async fn enable_two_factor(&self, user_id: Uuid, at: DateTime<Utc>) -> StorageResult<()>;

    /// Disables the enrollment, clearing `enabled_at`. The secret stays.
    async fn disable_two_factor(&self, user_id: Uuid) -> StorageResult<()>;

    /// Replaces the stored backup-code hashes (used when one is consumed).
    async fn update_backup_codes(&self, user_id: Uuid, hashes: &[String]) -> StorageResult<()>;
}
