//! Principal and two-factor enrollment models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A principal: a human identity the server authenticates.
///
/// Lockout invariant: `is_locked` implies either `locked_until` is in the
/// future or `failed_attempts` reached the configured maximum. Once
/// `locked_until` passes, the next login attempt self-heals the account back
/// to unlocked with a zeroed counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    // === Identity ===
    /// Unique identifier.
    pub id: Uuid,
    /// Email address, unique across the system.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Whether the email has been verified.
    pub email_verified: bool,

    // === Secret ===
    /// PHC-formatted password hash. Never serialized outward.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the password was last changed.
    pub password_changed_at: DateTime<Utc>,

    // === State ===
    /// Whether the account may log in at all.
    pub is_active: bool,
    /// Whether the account is currently locked out.
    pub is_locked: bool,
    /// Consecutive failed login attempts since the last success.
    pub failed_attempts: i32,
    /// When a lockout expires, if one is in effect.
    pub locked_until: Option<DateTime<Utc>>,
    /// Last successful login.
    pub last_login_at: Option<DateTime<Utc>>,

    // === Timestamps ===
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new active, unlocked user.
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            name: name.into(),
            email_verified: false,
            password_hash,
            password_changed_at: now,
            is_active: true,
            is_locked: false,
            failed_attempts: 0,
            locked_until: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks whether a lockout is currently in force.
    ///
    /// A locked flag with an elapsed `locked_until` counts as expired, not
    /// active; the login path clears it on the next attempt.
    #[must_use]
    pub fn lockout_active(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && self.locked_until.is_some_and(|until| until > now)
    }

    /// Checks whether the account carries an expired lockout.
    #[must_use]
    pub fn lockout_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_locked && !self.lockout_active(now)
    }
}

/// A two-factor enrollment.
///
/// Only an enrollment with `enabled = true` gates login; a pending one
/// (created at setup, before the first code is verified) is inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactor {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning principal; one enrollment per principal.
    pub user_id: Uuid,
    /// Base32-encoded TOTP secret. Never serialized outward.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Whether the enrollment is active.
    pub enabled: bool,
    /// When verification flipped the enrollment on.
    pub enabled_at: Option<DateTime<Utc>>,
    /// Hashes of unused backup codes.
    #[serde(skip_serializing)]
    pub backup_code_hashes: Vec<String>,
    /// When the enrollment was created.
    pub created_at: DateTime<Utc>,
}

impl TwoFactor {
    /// Creates a pending (not yet enabled) enrollment.
    #[must_use]
    pub fn pending(user_id: Uuid, secret: String, backup_code_hashes: Vec<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            secret,
            enabled: false,
            enabled_at: None,
            backup_code_hashes,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User::new("a@b.c", "Alice", "$argon2id$stub".to_string())
    }

    #[test]
    fn new_user_is_open() {
        let user = user();
        assert!(user.is_active);
        assert!(!user.is_locked);
        assert_eq!(user.failed_attempts, 0);
        assert!(!user.lockout_active(Utc::now()));
    }

    #[test]
    fn future_lockout_is_active() {
        let mut user = user();
        user.is_locked = true;
        user.locked_until = Some(Utc::now() + Duration::minutes(10));

        assert!(user.lockout_active(Utc::now()));
        assert!(!user.lockout_expired(Utc::now()));
    }

    #[test]
    fn elapsed_lockout_is_expired() {
        let mut user = user();
        user.is_locked = true;
        user.locked_until = Some(Utc::now() - Duration::minutes(1));

        assert!(!user.lockout_active(Utc::now()));
        assert!(user.lockout_expired(Utc::now()));
    }

    #[test]
    fn pending_enrollment_is_disabled() {
        let enrollment = TwoFactor::pending(Uuid::now_v7(), "SECRET".to_string(), vec![]);
        assert!(!enrollment.enabled);
        assert!(enrollment.enabled_at.is_none());
    }
}
