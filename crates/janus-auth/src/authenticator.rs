//! The login automaton.
//!
//! Credential verification, the failed-attempt counter and lockout state
//! machine, the two-factor branch, and post-authentication session minting.
//!
//! Admission states of a principal:
//!
//! - **Open**: not locked, attempts below the maximum
//! - **Locked**: locked with `locked_until` in the future; login refused
//! - **Expired lock**: locked with `locked_until` elapsed; self-heals to
//!   Open on the next attempt
//! - **Inactive**: `is_active = false`; terminal for login
//!
//! The failed-attempt increment is an atomic counter update at the store.
//! The lock write that may follow is deliberately not transactional with
//! it: every writer racing past the threshold observes a count at or above
//! the maximum and writes the same lock state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janus_core::config::TEMP_SESSION_TTL_SECS;
use janus_core::{AuditAction, AuditEvent};
use janus_crypto::{PasswordHashError, PasswordHasher};
use janus_model::{Session, User};
use janus_storage::UserProvider;

use crate::audit::AuditLogger;
use crate::error::{AuthError, AuthResult};
use crate::session::SessionService;
use crate::totp::TotpManager;

/// Outcome of a successful credential check.
#[derive(Debug)]
pub struct LoginOutcome {
    /// The authenticated principal.
    pub user: User,
    /// The minted session. Short-lived and pending when `requires_two_factor`.
    pub session: Session,
    /// Whether a TOTP code is still owed before the login is complete.
    pub requires_two_factor: bool,
}

/// Credential verification and lockout service.
pub struct Authenticator {
    users: Arc<dyn UserProvider>,
    sessions: Arc<SessionService>,
    totp: Arc<TotpManager>,
    hasher: Arc<PasswordHasher>,
    audit: AuditLogger,
    max_attempts: i32,
    lockout_duration: Duration,
}

impl Authenticator {
    /// Creates an authenticator.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserProvider>,
        sessions: Arc<SessionService>,
        totp: Arc<TotpManager>,
        hasher: Arc<PasswordHasher>,
        audit: AuditLogger,
        max_attempts: i32,
        lockout_duration: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            totp,
            hasher,
            audit,
            max_attempts,
            lockout_duration,
        }
    }

    /// Authenticates a principal with email and password.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidCredentials` for both unknown email and wrong
    /// password (the audit log records which), `AccountLocked` while a
    /// lockout is in force, and `AccountInactive` for disabled accounts.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<LoginOutcome> {
        let Some(mut user) = self.users.get_by_email(email).await? else {
            self.audit_failure(None, ip, user_agent, "user not found").await;
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();

        if user.lockout_active(now) {
            self.audit_failure(Some(&user), ip, user_agent, "account locked").await;
            return Err(AuthError::AccountLocked {
                until: user.locked_until,
            });
        }

        if user.lockout_expired(now) {
            // Self-heal: the lockout served its time.
            self.users.clear_lock(user.id).await?;
            user.is_locked = false;
            user.locked_until = None;
            user.failed_attempts = 0;
        }

        if !user.is_active {
            self.audit_failure(Some(&user), ip, user_agent, "account inactive").await;
            return Err(AuthError::AccountInactive);
        }

        match self.hasher.verify(password, &user.password_hash) {
            Ok(()) => {}
            Err(PasswordHashError::Mismatch | PasswordHashError::Malformed) => {
                return Err(self.register_failed_attempt(&user, ip, user_agent).await?);
            }
            Err(err) => return Err(AuthError::Internal(err.to_string())),
        }

        if user.failed_attempts > 0 {
            // Column update only; a concurrent failed attempt must not be
            // clobbered by a whole-record write.
            self.users.reset_failed_attempts(user.id).await?;
            user.failed_attempts = 0;
        }

        // Transparent cost upgrade: this is the only point where the
        // plaintext is in hand next to a verified stale hash. Not a
        // password change, so password_changed_at stays put.
        if self.hasher.needs_rehash(&user.password_hash) {
            match self.hasher.hash(password) {
                Ok(new_hash) => {
                    match self
                        .users
                        .update_password(user.id, &new_hash, user.password_changed_at)
                        .await
                    {
                        Ok(()) => user.password_hash = new_hash,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to persist rehashed password");
                        }
                    }
                }
                Err(err) => tracing::warn!(error = %err, "password rehash failed"),
            }
        }

        if self.totp.is_enabled(user.id).await? {
            let temp = self
                .sessions
                .create_temporary(
                    user.id,
                    ip,
                    user_agent,
                    Duration::from_secs(TEMP_SESSION_TTL_SECS),
                )
                .await?;

            self.audit
                .record(
                    AuditEvent::builder(AuditAction::TwoFactorRequired)
                        .user(user.id)
                        .client(ip, user_agent)
                        .build(),
                )
                .await;

            return Ok(LoginOutcome {
                user,
                session: temp,
                requires_two_factor: true,
            });
        }

        let session = self.sessions.create(user.id, ip, user_agent).await?;

        let now = Utc::now();
        self.users.update_last_login(user.id, now).await?;
        user.last_login_at = Some(now);

        self.audit
            .record(
                AuditEvent::builder(AuditAction::LoginSuccess)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        Ok(LoginOutcome {
            user,
            session,
            requires_two_factor: false,
        })
    }

    /// Completes a pending two-factor login.
    ///
    /// The temporary session is deleted before the real one is minted, so a
    /// captured temp token cannot be replayed even inside its window.
    pub async fn complete_two_factor(
        &self,
        temp_token: &str,
        code: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<(User, Session)> {
        let temp = self.sessions.validate(temp_token).await?;

        let user = self
            .users
            .get_by_id(temp.user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.totp.verify_login_code(user.id, code).await?;

        self.sessions.terminate(temp_token).await?;

        let session = self.sessions.create(user.id, ip, user_agent).await?;
        self.users.update_last_login(user.id, Utc::now()).await?;

        self.audit
            .record(
                AuditEvent::builder(AuditAction::TwoFactorVerified)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;
        self.audit
            .record(
                AuditEvent::builder(AuditAction::LoginSuccess2fa)
                    .user(user.id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        Ok((user, session))
    }

    /// Terminates a session, auditing the logout.
    pub async fn logout(&self, token: &str, ip: &str, user_agent: &str) -> AuthResult<()> {
        let session = self.sessions.validate(token).await?;

        self.audit
            .record(
                AuditEvent::builder(AuditAction::Logout)
                    .user(session.user_id)
                    .client(ip, user_agent)
                    .build(),
            )
            .await;

        self.sessions.terminate(token).await
    }

    /// Books a failed attempt and decides between lockout and plain failure.
    async fn register_failed_attempt(
        &self,
        user: &User,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<AuthError> {
        let attempts = self.users.increment_failed_attempts(user.id).await?;

        if attempts >= self.max_attempts {
            let until = Utc::now()
                + chrono::Duration::from_std(self.lockout_duration)
                    .unwrap_or_else(|_| chrono::Duration::seconds(900));

            self.users.lock(user.id, until).await?;

            self.audit
                .record(
                    AuditEvent::builder(AuditAction::AccountLocked)
                        .user(user.id)
                        .client(ip, user_agent)
                        .detail("max login attempts exceeded")
                        .build(),
                )
                .await;

            return Ok(AuthError::AccountLocked { until: Some(until) });
        }

        self.audit_failure(Some(user), ip, user_agent, "invalid password").await;
        Ok(AuthError::InvalidCredentials)
    }

    async fn audit_failure(&self, user: Option<&User>, ip: &str, user_agent: &str, detail: &str) {
        let mut builder = AuditEvent::builder(AuditAction::LoginFailed)
            .client(ip, user_agent)
            .detail(detail);
        if let Some(user) = user {
            builder = builder.user(user.id);
        }
        self.audit.record(builder.build()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_test_support::{MemoryAuditStore, MemorySessionStore, MemoryUserProvider};
    use uuid::Uuid;

    const PASSWORD: &str = "Pw0rd!AAx";

    struct Harness {
        authenticator: Authenticator,
        users: Arc<MemoryUserProvider>,
        store: Arc<MemorySessionStore>,
        audit: Arc<MemoryAuditStore>,
        user_id: Uuid,
    }

    fn harness() -> Harness {
        let users = MemoryUserProvider::new();
        let store = MemorySessionStore::new();
        let audit = MemoryAuditStore::new();
        let hasher = Arc::new(PasswordHasher::with_defaults());

        let user_id = users.seed(User::new(
            "a@b.c",
            "Alice",
            hasher.hash(PASSWORD).unwrap(),
        ));

        let sessions = Arc::new(SessionService::new(
            store.clone(),
            Duration::from_secs(3600),
        ));
        let totp = Arc::new(TotpManager::new(users.clone(), hasher.clone(), "janus"));

        let authenticator = Authenticator::new(
            users.clone(),
            sessions,
            totp,
            hasher,
            AuditLogger::new(audit.clone()),
            5,
            Duration::from_secs(900),
        );

        Harness {
            authenticator,
            users,
            store,
            audit,
            user_id,
        }
    }

    #[tokio::test]
    async fn happy_login_mints_a_session() {
        let h = harness();

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        assert!(!outcome.requires_two_factor);
        assert_eq!(outcome.session.token.len(), 86);
        assert!(outcome.user.last_login_at.is_some());
        assert!(h.audit.actions().contains(&"login_success"));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let h = harness();

        let missing = h
            .authenticator
            .login("nobody@x", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        let wrong = h
            .authenticator
            .login("a@b.c", "wrong", "127.0.0.1", "test")
            .await
            .unwrap_err();

        assert!(matches!(missing, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));

        // The audit log, not the response, records the difference.
        let details: Vec<String> = h.audit.events().iter().map(|e| e.detail.clone()).collect();
        assert!(details.contains(&"user not found".to_string()));
        assert!(details.contains(&"invalid password".to_string()));
    }

    #[tokio::test]
    async fn five_failures_lock_the_account() {
        let h = harness();

        for attempt in 1..=4 {
            let err = h
                .authenticator
                .login("a@b.c", "wrong", "127.0.0.1", "test")
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials), "attempt {attempt}");
        }

        // Fifth failure trips the lock
        let err = h
            .authenticator
            .login("a@b.c", "wrong", "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { until: Some(_) }));

        // The correct password is now also refused
        let err = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));

        let user = h.users.snapshot(h.user_id).unwrap();
        assert!(user.is_locked);
        assert_eq!(user.failed_attempts, 5);
        assert!(h.audit.actions().contains(&"account_locked"));
    }

    #[tokio::test]
    async fn expired_lockout_self_heals() {
        let h = harness();

        // Lock with an already-elapsed window
        h.users
            .lock(h.user_id, Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();
        assert!(!outcome.requires_two_factor);

        let user = h.users.snapshot(h.user_id).unwrap();
        assert!(!user.is_locked);
        assert!(user.locked_until.is_none());
        assert_eq!(user.failed_attempts, 0);
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let h = harness();

        for _ in 0..3 {
            let _ = h
                .authenticator
                .login("a@b.c", "wrong", "127.0.0.1", "test")
                .await;
        }
        assert_eq!(h.users.snapshot(h.user_id).unwrap().failed_attempts, 3);

        h.authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        assert_eq!(h.users.snapshot(h.user_id).unwrap().failed_attempts, 0);
    }

    #[tokio::test]
    async fn login_upgrades_an_outdated_hash() {
        let h = harness();

        // Re-seed the stored hash with weaker cost parameters.
        let weak_hasher = PasswordHasher::new(janus_crypto::password::HashParams {
            memory_cost: 8 * 1024,
            time_cost: 1,
            parallelism: 1,
            hash_length: 32,
        });
        let changed_at = h.users.snapshot(h.user_id).unwrap().password_changed_at;
        h.users
            .update_password(h.user_id, &weak_hasher.hash(PASSWORD).unwrap(), changed_at)
            .await
            .unwrap();

        h.authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        let user = h.users.snapshot(h.user_id).unwrap();
        // The stored hash now carries current parameters and still verifies
        let current = PasswordHasher::with_defaults();
        assert!(!current.needs_rehash(&user.password_hash));
        assert!(current.verify(PASSWORD, &user.password_hash).is_ok());
        // A rehash is not a password change
        assert_eq!(user.password_changed_at, changed_at);
    }

    #[tokio::test]
    async fn inactive_account_is_refused() {
        let h = harness();

        let mut user = h.users.snapshot(h.user_id).unwrap();
        user.is_active = false;
        h.users.update(&user).await.unwrap();

        let err = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive));
    }

    async fn enable_totp(h: &Harness) -> String {
        let hasher = PasswordHasher::with_defaults();
        let secret = janus_crypto::random::generate_totp_secret();
        let enrollment = janus_model::TwoFactor {
            enabled: true,
            enabled_at: Some(Utc::now()),
            ..janus_model::TwoFactor::pending(
                h.user_id,
                secret.clone(),
                vec![hasher.hash("backup-01").unwrap()],
            )
        };
        h.users.upsert_two_factor(&enrollment).await.unwrap();
        secret
    }

    fn current_code(secret: &str) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        crate::totp::generate_totp_at(secret, &crate::totp::TotpConfig::default(), now).unwrap()
    }

    #[tokio::test]
    async fn enabled_totp_branches_into_a_temp_session() {
        let h = harness();
        enable_totp(&h).await;

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        assert!(outcome.requires_two_factor);
        // Temp session is capped at five minutes, not the session timeout
        let lifetime = outcome.session.expires_at - outcome.session.created_at;
        assert!(lifetime.num_seconds() <= 300);
        // last_login_at is not stamped until the second factor passes
        assert!(h.users.snapshot(h.user_id).unwrap().last_login_at.is_none());
        assert!(h.audit.actions().contains(&"2fa_required"));
    }

    #[tokio::test]
    async fn two_factor_completion_swaps_temp_for_real() {
        let h = harness();
        let secret = enable_totp(&h).await;

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();
        let temp_token = outcome.session.token.clone();

        let (user, session) = h
            .authenticator
            .complete_two_factor(&temp_token, &current_code(&secret), "127.0.0.1", "test")
            .await
            .unwrap();

        assert_eq!(user.id, h.user_id);
        assert_ne!(session.token, temp_token);
        assert!(h.users.snapshot(h.user_id).unwrap().last_login_at.is_some());

        // The temp token died with the exchange: replay is impossible
        let err = h
            .authenticator
            .complete_two_factor(&temp_token, &current_code(&secret), "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionNotFound));

        let actions = h.audit.actions();
        assert!(actions.contains(&"2fa_verified"));
        assert!(actions.contains(&"login_success_2fa"));
    }

    #[tokio::test]
    async fn wrong_totp_code_keeps_the_temp_session() {
        let h = harness();
        enable_totp(&h).await;

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        let err = h
            .authenticator
            .complete_two_factor(&outcome.session.token, "000000", "127.0.0.1", "test")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTotp));

        // No real session was minted
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn logout_terminates_the_session() {
        let h = harness();

        let outcome = h
            .authenticator
            .login("a@b.c", PASSWORD, "127.0.0.1", "test")
            .await
            .unwrap();

        h.authenticator
            .logout(&outcome.session.token, "127.0.0.1", "test")
            .await
            .unwrap();

        assert!(h.store.is_empty());
        assert!(h.audit.actions().contains(&"logout"));
    }
}
