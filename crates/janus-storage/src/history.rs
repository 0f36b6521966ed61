//! Password history provider trait.

use async_trait::async_trait;
use janus_model::PasswordHistoryEntry;
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for retired password hashes.
#[async_trait]
pub trait PasswordHistoryProvider: Send + Sync {
    /// Appends a retired hash for a principal.
    async fn append(&self, entry: &PasswordHistoryEntry) -> StorageResult<()>;

    /// Returns the `limit` most recent entries, newest first.
    ///
    /// These form the forbidden set for the reuse check.
    async fn recent(&self, user_id: Uuid, limit: usize) -> StorageResult<Vec<PasswordHistoryEntry>>;

    /// Deletes all but the `keep` newest entries. Returns the number removed.
    async fn prune(&self, user_id: Uuid, keep: usize) -> StorageResult<u64>;
}
