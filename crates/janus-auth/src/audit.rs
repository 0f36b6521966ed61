//! Audit logging wrapper.

use std::sync::Arc;

use janus_core::AuditEvent;
use janus_storage::AuditStore;

/// Fire-and-forget audit writer.
///
/// A failed audit write is logged and swallowed; nothing on the main path
/// may fail or block because the audit sink is down.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    /// Creates a logger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Appends an audit record, swallowing failures.
    pub async fn record(&self, event: AuditEvent) {
        if let Err(err) = self.store.append(&event).await {
            tracing::warn!(action = event.action.as_str(), error = %err, "audit write failed");
        }
    }
}
