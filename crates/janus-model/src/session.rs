//! Server-side session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// An authenticated user-agent, identified by an opaque high-entropy token.
///
/// The token is the credential: it is never logged and never included when
/// sessions are listed. A session is valid iff `now < expires_at`; renewal
/// slides `expires_at` forward relative to now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning principal.
    pub user_id: Uuid,
    /// Opaque bearer token. Never serialized outward.
    #[serde(skip_serializing)]
    pub token: String,
    /// Client IP at creation.
    pub ip_address: String,
    /// Client user agent at creation.
    pub user_agent: String,
    /// Hard expiry; renewal moves this forward.
    pub expires_at: DateTime<Utc>,
    /// Last renewal (or creation).
    pub last_activity_at: DateTime<Utc>,
    /// When the session was minted.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session expiring `timeout` from now.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        token: String,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            token,
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            expires_at: now + timeout,
            last_activity_at: now,
            created_at: now,
        }
    }

    /// Checks whether the session has expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime, zero once expired.
    ///
    /// Used by the KV backend to derive the key TTL.
    #[must_use]
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Slides the expiry window forward relative to now.
    pub fn renew(&mut self, timeout: Duration) {
        let now = Utc::now();
        self.expires_at = now + timeout;
        self.last_activity_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(timeout: Duration) -> Session {
        Session::new(
            Uuid::now_v7(),
            "token".to_string(),
            "127.0.0.1",
            "test-agent",
            timeout,
        )
    }

    #[test]
    fn fresh_session_is_valid() {
        let session = session(Duration::from_secs(3600));
        assert!(!session.is_expired(Utc::now()));
        assert!(session.expires_at > session.created_at);
    }

    #[test]
    fn zero_timeout_session_is_expired() {
        let session = session(Duration::ZERO);
        assert!(session.is_expired(Utc::now()));
        assert_eq!(session.remaining_ttl(Utc::now()), Duration::ZERO);
    }

    #[test]
    fn renew_extends_expiry() {
        let mut session = session(Duration::from_secs(60));
        let old_expiry = session.expires_at;

        session.renew(Duration::from_secs(3600));

        assert!(session.expires_at > old_expiry);
        assert!(session.last_activity_at >= session.created_at);
    }
}
