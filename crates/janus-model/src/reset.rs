//! Password reset tickets and password history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A one-shot password reset ticket.
///
/// `used = true` is terminal; the transition happens exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetTicket {
    /// Unique identifier.
    pub id: Uuid,
    /// Principal the ticket was issued for.
    pub user_id: Uuid,
    /// Email the ticket was requested with.
    pub email: String,
    /// High-entropy bearer token. Never serialized outward.
    #[serde(skip_serializing)]
    pub token: String,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Whether the ticket has been consumed.
    pub used: bool,
    /// When it was consumed.
    pub used_at: Option<DateTime<Utc>>,
    /// When it was issued.
    pub created_at: DateTime<Utc>,
}

impl PasswordResetTicket {
    /// Creates a new unused ticket expiring `ttl` from now.
    #[must_use]
    pub fn new(user_id: Uuid, email: impl Into<String>, token: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            email: email.into(),
            token,
            expires_at: now + ttl,
            used: false,
            used_at: None,
            created_at: now,
        }
    }

    /// Checks whether the ticket has expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A retired password hash, kept to block reuse.
///
/// The N most recent entries per principal form the forbidden set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    /// Owning principal.
    pub user_id: Uuid,
    /// The retired PHC-formatted hash.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the hash was retired.
    pub created_at: DateTime<Utc>,
}

impl PasswordHistoryEntry {
    /// Creates a history entry stamped now.
    #[must_use]
    pub fn new(user_id: Uuid, password_hash: String) -> Self {
        Self {
            user_id,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ticket_is_unused_and_valid() {
        let ticket = PasswordResetTicket::new(
            Uuid::now_v7(),
            "a@b.c",
            "token".to_string(),
            Duration::from_secs(3600),
        );

        assert!(!ticket.used);
        assert!(ticket.used_at.is_none());
        assert!(!ticket.is_expired(Utc::now()));
    }

    #[test]
    fn zero_ttl_ticket_is_expired() {
        let ticket =
            PasswordResetTicket::new(Uuid::now_v7(), "a@b.c", "token".to_string(), Duration::ZERO);
        assert!(ticket.is_expired(Utc::now()));
    }
}
