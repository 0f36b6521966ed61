//! Audit store trait.

use async_trait::async_trait;
use janus_core::AuditEvent;

use crate::error::StorageResult;

/// Append-only sink for audit records.
///
/// Callers treat failures as log-and-continue; nothing on the main path may
/// block on an audit write failing.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Appends an audit record.
    async fn append(&self, event: &AuditEvent) -> StorageResult<()>;
}
