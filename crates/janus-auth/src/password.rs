//! Password lifecycle: change, reset-via-ticket, reuse prevention, cascade.
//!
//! Both the authenticated change and the ticket-borne reset funnel through
//! one application step: validate policy, check the history window, swap the
//! hash, archive the old one, prune, then cascade-delete every session the
//! principal holds. The cascade and the history bookkeeping are best-effort
//!: a failure there is logged, never unwound into the password change.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janus_core::{AuditAction, AuditEvent};
use janus_crypto::random::generate_reset_token;
use janus_crypto::{PasswordHashError, PasswordHasher, PasswordPolicy};
use janus_model::{PasswordHistoryEntry, PasswordResetTicket, User};
use janus_storage::{PasswordHistoryProvider, ResetTicketProvider, SessionStore, UserProvider};
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::error::{AuthError, AuthResult};

/// Password change and reset service.
pub struct PasswordManager {
    users: Arc<dyn UserProvider>,
    history: Arc<dyn PasswordHistoryProvider>,
    tickets: Arc<dyn ResetTicketProvider>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<PasswordHasher>,
    audit: AuditLogger,
    policy: PasswordPolicy,
    history_count: usize,
    reset_ttl: Duration,
}

impl PasswordManager {
    /// Creates a password manager.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        users: Arc<dyn UserProvider>,
        history: Arc<dyn PasswordHistoryProvider>,
        tickets: Arc<dyn ResetTicketProvider>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<PasswordHasher>,
        audit: AuditLogger,
        policy: PasswordPolicy,
        history_count: usize,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            users,
            history,
            tickets,
            sessions,
            hasher,
            audit,
            policy,
            history_count,
            reset_ttl,
        }
    }

    /// Changes a password for an authenticated principal.
    ///
    /// # Errors
    ///
    /// `WrongCurrentPassword` when the current password fails to verify,
    /// `Policy` when the new one violates policy, `PasswordReused` when it
    /// matches one of the last N.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<()> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        match self.hasher.verify(current_password, &user.password_hash) {
            Ok(()) => {}
            Err(PasswordHashError::Mismatch | PasswordHashError::Malformed) => {
                return Err(AuthError::WrongCurrentPassword);
            }
            Err(err) => return Err(AuthError::Internal(err.to_string())),
        }

        self.apply_new_password(&user, new_password).await?;

        self.audit
            .record(
                AuditEvent::builder(AuditAction::PasswordChanged)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        Ok(())
    }

    /// Issues a reset ticket for an email address.
    ///
    /// Returns `None`, with no side effect, when the address is unknown.
    /// The HTTP layer must render both outcomes identically; only the mail
    /// dispatch differs.
    pub async fn generate_reset_token(
        &self,
        email: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<Option<String>> {
        let Some(user) = self.users.get_by_email(email).await? else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let ticket = PasswordResetTicket::new(user.id, email, token.clone(), self.reset_ttl);

        self.tickets.create(&ticket).await?;

        self.audit
            .record(
                AuditEvent::builder(AuditAction::PasswordResetRequested)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        Ok(Some(token))
    }

    /// Consumes a reset ticket and applies the new password.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<()> {
        let ticket = self
            .tickets
            .get_by_token(token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if ticket.used {
            return Err(AuthError::TokenUsed);
        }
        if ticket.is_expired(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .users
            .get_by_id(ticket.user_id)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        self.apply_new_password(&user, new_password).await?;

        // Terminal transition; the password is already swapped, so a
        // failure here is logged rather than unwound.
        if let Err(err) = self.tickets.mark_used(token, Utc::now()).await {
            tracing::warn!(error = %err, "failed to mark reset ticket used");
        }

        self.audit
            .record(
                AuditEvent::builder(AuditAction::PasswordReset)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        Ok(())
    }

    /// Background sweep of expired reset tickets.
    pub async fn purge_expired_tickets(&self) -> AuthResult<u64> {
        Ok(self.tickets.delete_expired(Utc::now()).await?)
    }

    /// Policy check, history check, hash swap, archive, prune, cascade.
    async fn apply_new_password(&self, user: &User, new_password: &str) -> AuthResult<()> {
        self.policy.validate(new_password)?;

        if self.history_count > 0 {
            let recent = self.history.recent(user.id, self.history_count).await?;
            for entry in &recent {
                if self.hasher.verify(new_password, &entry.password_hash).is_ok() {
                    return Err(AuthError::PasswordReused);
                }
            }
            // The current hash is part of the forbidden set even before it
            // is archived.
            if self.hasher.verify(new_password, &user.password_hash).is_ok() {
                return Err(AuthError::PasswordReused);
            }
        }

        let new_hash = self
            .hasher
            .hash(new_password)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let old_hash = user.password_hash.clone();

        self.users
            .update_password(user.id, &new_hash, Utc::now())
            .await?;

        if self.history_count > 0 {
            let entry = PasswordHistoryEntry::new(user.id, old_hash);
            if let Err(err) = self.history.append(&entry).await {
                tracing::warn!(error = %err, "failed to archive password hash");
            }
            if let Err(err) = self.history.prune(user.id, self.history_count).await {
                tracing::warn!(error = %err, "failed to prune password history");
            }
        }

        if let Err(err) = self.sessions.delete_by_user(user.id).await {
            // Worst case: old sessions live until they expire.
            tracing::warn!(error = %err, "failed to cascade session deletion");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_crypto::PolicyViolation;
    use janus_test_support::{
        MemoryAuditStore, MemoryPasswordHistoryProvider, MemoryResetTicketProvider,
        MemorySessionStore, MemoryUserProvider,
    };

    const PASSWORD: &str = "Curr3nt!pw";
    const NEW_PASSWORD: &str = "N3w!passwd";

    struct Harness {
        manager: PasswordManager,
        users: Arc<MemoryUserProvider>,
        sessions: Arc<MemorySessionStore>,
        tickets: Arc<MemoryResetTicketProvider>,
        history: Arc<MemoryPasswordHistoryProvider>,
        user_id: Uuid,
    }

    fn harness(history_count: usize) -> Harness {
        let users = MemoryUserProvider::new();
        let sessions = MemorySessionStore::new();
        let tickets = MemoryResetTicketProvider::new();
        let history = MemoryPasswordHistoryProvider::new();
        let hasher = Arc::new(PasswordHasher::with_defaults());

        let user_id = users.seed(User::new(
            "a@b.c",
            "Alice",
            hasher.hash(PASSWORD).unwrap(),
        ));

        let manager = PasswordManager::new(
            users.clone(),
            history.clone(),
            tickets.clone(),
            sessions.clone(),
            hasher,
            AuditLogger::new(MemoryAuditStore::new()),
            PasswordPolicy::default(),
            history_count,
            Duration::from_secs(3600),
        );

        Harness {
            manager,
            users,
            sessions,
            tickets,
            history,
            user_id,
        }
    }

    async fn seed_session(h: &Harness) -> String {
        let session = janus_model::Session::new(
            h.user_id,
            janus_crypto::random::generate_session_token(),
            "127.0.0.1",
            "test",
            Duration::from_secs(3600),
        );
        h.sessions.create(&session).await.unwrap();
        session.token
    }

    #[tokio::test]
    async fn change_password_swaps_hash_and_cascades_sessions() {
        let h = harness(5);
        seed_session(&h).await;
        seed_session(&h).await;

        h.manager
            .change_password(h.user_id, PASSWORD, NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        // Every session is gone
        assert!(h.sessions.is_empty());
        // The old hash went into history
        assert_eq!(h.history.count_for(h.user_id), 1);
        // The stored hash now verifies the new password
        let user = h.users.snapshot(h.user_id).unwrap();
        let hasher = PasswordHasher::with_defaults();
        assert!(hasher.verify(NEW_PASSWORD, &user.password_hash).is_ok());
    }

    #[tokio::test]
    async fn wrong_current_password_is_refused() {
        let h = harness(5);

        let err = h
            .manager
            .change_password(h.user_id, "not-it", NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongCurrentPassword));
    }

    #[tokio::test]
    async fn policy_violations_surface_specifically() {
        let h = harness(5);

        let err = h
            .manager
            .change_password(h.user_id, PASSWORD, "short", "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Policy(PolicyViolation::TooShort(_))));
    }

    #[tokio::test]
    async fn reusing_a_recent_password_is_refused() {
        let h = harness(5);

        h.manager
            .change_password(h.user_id, PASSWORD, NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        // The original password is now in the forbidden window
        let err = h
            .manager
            .change_password(h.user_id, NEW_PASSWORD, PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordReused));

        // So is the current one
        let err = h
            .manager
            .change_password(h.user_id, NEW_PASSWORD, NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordReused));
    }

    #[tokio::test]
    async fn history_window_zero_disables_the_reuse_check() {
        let h = harness(0);

        h.manager
            .change_password(h.user_id, PASSWORD, NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();
        // Swapping straight back is allowed with no window
        h.manager
            .change_password(h.user_id, NEW_PASSWORD, PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        assert_eq!(h.history.count_for(h.user_id), 0);
    }

    #[tokio::test]
    async fn history_is_pruned_to_the_window() {
        let h = harness(2);

        let passwords = ["Aa1!aaaaa1", "Bb2@bbbbb2", "Cc3#ccccc3", "Dd4$ddddd4"];
        let mut current = PASSWORD.to_string();
        for next in passwords {
            h.manager
                .change_password(h.user_id, &current, next, "127.0.0.1", "test")
                .await
                .unwrap();
            current = next.to_string();
        }

        assert_eq!(h.history.count_for(h.user_id), 2);
    }

    #[tokio::test]
    async fn unknown_email_returns_no_token_without_side_effects() {
        let h = harness(5);

        let token = h
            .manager
            .generate_reset_token("nobody@x", "127.0.0.1", "test")
            .await
            .unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn reset_flow_consumes_the_ticket() {
        let h = harness(5);
        seed_session(&h).await;

        let token = h
            .manager
            .generate_reset_token("a@b.c", "127.0.0.1", "test")
            .await
            .unwrap()
            .expect("known email yields a token");

        h.manager
            .reset_password(&token, NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        // Cascade ran
        assert!(h.sessions.is_empty());

        // The ticket is terminal: a second use fails
        let err = h
            .manager
            .reset_password(&token, "An0ther!pw", "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenUsed));
    }

    #[tokio::test]
    async fn unknown_and_expired_tickets_are_rejected() {
        let h = harness(5);

        let err = h
            .manager
            .reset_password("no-such-token", NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));

        // Expired ticket
        let ticket = PasswordResetTicket::new(
            h.user_id,
            "a@b.c",
            "expired-token".to_string(),
            Duration::ZERO,
        );
        h.tickets.create(&ticket).await.unwrap();

        let err = h
            .manager
            .reset_password("expired-token", NEW_PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }
}
