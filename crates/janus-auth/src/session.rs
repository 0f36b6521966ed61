//! Session service.
//!
//! Creation, validation, sliding-window renewal and termination over the
//! pluggable [`SessionStore`]. Tokens are opaque 64-byte CSPRNG strings;
//! nothing ever parses them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janus_crypto::random::generate_session_token;
use janus_model::Session;
use janus_storage::SessionStore;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Session lifecycle service.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    timeout: Duration,
}

impl SessionService {
    /// Creates a service with the given store and sliding-window timeout.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns the configured session timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Mints and persists a session with the standard timeout.
    pub async fn create(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
    ) -> AuthResult<Session> {
        self.create_with_timeout(user_id, ip_address, user_agent, self.timeout)
            .await
    }

    /// Mints a session with an explicit (shorter) lifetime.
    ///
    /// Used for the pending-2FA temporary session: same record shape, a
    /// different expiry.
    pub async fn create_temporary(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
        ttl: Duration,
    ) -> AuthResult<Session> {
        self.create_with_timeout(user_id, ip_address, user_agent, ttl)
            .await
    }

    async fn create_with_timeout(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> AuthResult<Session> {
        let token = generate_session_token();
        let session = Session::new(user_id, token, ip_address, user_agent, timeout);

        self.store.create(&session).await?;

        Ok(session)
    }

    /// Loads and validates a session by token.
    ///
    /// An expired session is deleted on sight and reported as expired.
    pub async fn validate(&self, token: &str) -> AuthResult<Session> {
        let session = self
            .store
            .get_by_token(token)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired(Utc::now()) {
            self.store.delete(session.id).await?;
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }

    /// Validates and slides the expiry window forward.
    ///
    /// Two concurrent renewals are both safe: last writer wins and both
    /// extend.
    pub async fn renew(&self, token: &str) -> AuthResult<Session> {
        let mut session = self.validate(token).await?;

        session.renew(self.timeout);
        self.store.update(&session).await?;

        Ok(session)
    }

    /// Terminates a session by token. Succeeds if it is already gone.
    pub async fn terminate(&self, token: &str) -> AuthResult<()> {
        self.store.delete_by_token(token).await?;
        Ok(())
    }

    /// Terminates every session for a principal.
    pub async fn terminate_all(&self, user_id: Uuid) -> AuthResult<()> {
        self.store.delete_by_user(user_id).await?;
        Ok(())
    }

    /// Lists a principal's live sessions, reaping expired ones on the way.
    pub async fn active_sessions(&self, user_id: Uuid) -> AuthResult<Vec<Session>> {
        let now = Utc::now();
        let mut active = Vec::new();

        for session in self.store.get_by_user(user_id).await? {
            if session.is_expired(now) {
                self.store.delete(session.id).await?;
            } else {
                active.push(session);
            }
        }

        Ok(active)
    }

    /// Counts live sessions across all principals.
    pub async fn count_active(&self) -> AuthResult<u64> {
        Ok(self.store.count_active(Utc::now()).await?)
    }

    /// Background sweep of expired sessions.
    ///
    /// A no-op on backends that expire natively; no invariant depends on it
    /// running.
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        Ok(self.store.delete_expired(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_test_support::MemorySessionStore;

    fn service(timeout: Duration) -> (SessionService, Arc<MemorySessionStore>) {
        let store = MemorySessionStore::new();
        (SessionService::new(store.clone(), timeout), store)
    }

    #[tokio::test]
    async fn create_then_validate_round_trips() {
        let (service, _) = service(Duration::from_secs(3600));
        let user_id = Uuid::now_v7();

        let session = service.create(user_id, "127.0.0.1", "test").await.unwrap();
        assert_eq!(session.token.len(), 86);

        let loaded = service.validate(&session.token).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.user_id, user_id);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let (service, _) = service(Duration::from_secs(3600));
        assert!(matches!(
            service.validate("no-such-token").await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn expired_session_is_deleted_on_validate() {
        let (service, store) = service(Duration::ZERO);
        let session = service
            .create(Uuid::now_v7(), "127.0.0.1", "test")
            .await
            .unwrap();

        assert!(matches!(
            service.validate(&session.token).await,
            Err(AuthError::SessionExpired)
        ));
        // Deleted on sight; a second attempt no longer finds it.
        assert!(matches!(
            service.validate(&session.token).await,
            Err(AuthError::SessionNotFound)
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn renew_slides_the_window() {
        let (service, _) = service(Duration::from_secs(60));
        let session = service
            .create(Uuid::now_v7(), "127.0.0.1", "test")
            .await
            .unwrap();

        let renewed = service.renew(&session.token).await.unwrap();
        assert!(renewed.expires_at >= session.expires_at);
        assert!(renewed.last_activity_at >= session.last_activity_at);
    }

    #[tokio::test]
    async fn terminate_invalidates_the_token() {
        let (service, _) = service(Duration::from_secs(3600));
        let session = service
            .create(Uuid::now_v7(), "127.0.0.1", "test")
            .await
            .unwrap();

        service.terminate(&session.token).await.unwrap();

        assert!(matches!(
            service.validate(&session.token).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn terminate_all_clears_every_session_for_the_user() {
        let (service, store) = service(Duration::from_secs(3600));
        let user_id = Uuid::now_v7();
        let other = Uuid::now_v7();

        service.create(user_id, "127.0.0.1", "a").await.unwrap();
        service.create(user_id, "127.0.0.1", "b").await.unwrap();
        service.create(other, "127.0.0.1", "c").await.unwrap();

        service.terminate_all(user_id).await.unwrap();

        assert!(service.active_sessions(user_id).await.unwrap().is_empty());
        assert_eq!(service.active_sessions(other).await.unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn temporary_session_uses_the_given_ttl() {
        let (service, _) = service(Duration::from_secs(3600));
        let session = service
            .create_temporary(Uuid::now_v7(), "127.0.0.1", "test", Duration::from_secs(300))
            .await
            .unwrap();

        let lifetime = session.expires_at - session.created_at;
        assert!(lifetime.num_seconds() <= 300);
    }
}
