//! Password reset ticket provider trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::PasswordResetTicket;

use crate::error::StorageResult;

/// Provider for password reset ticket persistence.
#[async_trait]
pub trait ResetTicketProvider: Send + Sync {
    /// Persists a new ticket.
    async fn create(&self, ticket: &PasswordResetTicket) -> StorageResult<()>;

    /// Gets a ticket by its token.
    async fn get_by_token(&self, token: &str) -> StorageResult<Option<PasswordResetTicket>>;

    /// Marks a ticket used, stamping `used_at`.
    ///
    /// The `used` transition is one-way; callers check the flag before
    /// applying the reset and this write makes the ticket terminal.
    async fn mark_used(&self, token: &str, at: DateTime<Utc>) -> StorageResult<()>;

    /// Removes expired tickets. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}
