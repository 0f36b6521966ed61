//! Session store contract.
//!
//! Two backends implement it: the durable SQL store (strong consistency,
//! sweep-based expiry) and the Redis store (native TTL expiry, per-user
//! token sets). Callers cannot tell them apart; backend-specific abilities
//! are capability methods here, never downcasts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::Session;
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` if the token already exists.
    async fn create(&self, session: &Session) -> StorageResult<()>;

    /// Gets a session by its token.
    async fn get_by_token(&self, token: &str) -> StorageResult<Option<Session>>;

    /// Gets all sessions for a principal.
    ///
    /// KV backends lazily drop index entries whose session has expired out
    /// from under them.
    async fn get_by_user(&self, user_id: Uuid) -> StorageResult<Vec<Session>>;

    /// Replaces a session record (renewal).
    async fn update(&self, session: &Session) -> StorageResult<()>;

    /// Deletes a session by ID.
    async fn delete(&self, id: Uuid) -> StorageResult<()>;

    /// Deletes a session by token. Succeeds if it is already gone.
    async fn delete_by_token(&self, token: &str) -> StorageResult<()>;

    /// Deletes every session for a principal.
    async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<()>;

    /// Removes expired sessions; a no-op where the backend expires natively.
    ///
    /// Returns the number of sessions removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;

    /// Counts sessions that are still valid at `now`.
    async fn count_active(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}
