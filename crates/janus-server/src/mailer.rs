//! Outbound mail sink.
//!
//! The server only ever fires one message: the password reset link. Mail
//! delivery is a pure side effect: the HTTP response is identical whether
//! or not anything was sent, and a delivery failure never surfaces.

use async_trait::async_trait;

/// Outbound mail dispatch.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Dispatches a password reset message carrying the ticket link.
    async fn send_password_reset(&self, email: &str, reset_url: &str);
}

/// Mailer that records the dispatch in the log instead of sending.
///
/// The default for development and tests; deployments plug an SMTP
/// implementation in behind the same trait.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, _reset_url: &str) {
        // The URL embeds the ticket token; only the recipient is loggable.
        tracing::info!(%email, "password reset mail dispatched");
    }
}
