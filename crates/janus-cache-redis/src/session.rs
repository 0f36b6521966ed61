//! Redis session store implementation.
//!
//! Key layout (all under the configured prefix):
//!
//! - `session:<token>`: JSON session record, TTL = remaining lifetime
//! - `session-id:<id>`: token lookup for delete-by-id, same TTL
//! - `user-sessions:<user_id>`: set of live tokens for the principal
//!
//! Redis expires session keys natively; set members that outlive their
//! session are removed lazily when a principal-scoped read trips over them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fred::prelude::*;
use fred::types::scan::Scanner;
use futures::TryStreamExt;
use janus_model::Session;
use janus_storage::SessionStore;
use janus_storage::error::{StorageError, StorageResult};
use uuid::Uuid;

use crate::config::RedisConfig;
use crate::error::{from_redis_error, from_serde_error};

/// Redis-backed session store.
pub struct RedisSessionStore {
    client: Client,
    config: RedisConfig,
}

impl RedisSessionStore {
    /// Connects to Redis and returns the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(config: RedisConfig) -> StorageResult<Self> {
        let redis_config = Config::from_url(&config.url)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let client = Client::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        client.init().await.map_err(from_redis_error)?;

        Ok(Self { client, config })
    }

    /// Creates a store from an already-initialized client.
    #[must_use]
    pub const fn new(client: Client, config: RedisConfig) -> Self {
        Self { client, config }
    }

    fn session_key(&self, token: &str) -> String {
        self.config.prefixed_key(&format!("session:{token}"))
    }

    fn id_key(&self, id: Uuid) -> String {
        self.config.prefixed_key(&format!("session-id:{id}"))
    }

    fn user_key(&self, user_id: Uuid) -> String {
        self.config.prefixed_key(&format!("user-sessions:{user_id}"))
    }

    /// Remaining TTL in whole seconds, floored at one so a session expiring
    /// momentarily still lands in Redis long enough to be deleted normally.
    fn ttl_seconds(session: &Session) -> i64 {
        #[allow(clippy::cast_possible_wrap)]
        let secs = session.remaining_ttl(Utc::now()).as_secs() as i64;
        secs.max(1)
    }

    async fn write_session(&self, session: &Session, ttl: i64, create: bool) -> StorageResult<()> {
        let data = serde_json::to_string(&StoredSession::from(session)).map_err(from_serde_error)?;

        let options = if create { Some(SetOptions::NX) } else { None };

        let stored: Option<String> = self
            .client
            .set(
                self.session_key(&session.token),
                data,
                Some(Expiration::EX(ttl)),
                options,
                false,
            )
            .await
            .map_err(from_redis_error)?;

        if create && stored.is_none() {
            return Err(StorageError::duplicate("Session", "token"));
        }

        self.client
            .set::<(), _, _>(
                self.id_key(session.id),
                session.token.clone(),
                Some(Expiration::EX(ttl)),
                None,
                false,
            )
            .await
            .map_err(from_redis_error)?;

        Ok(())
    }

    async fn read_session(&self, token: &str) -> StorageResult<Option<Session>> {
        let data: Option<String> = self
            .client
            .get(self.session_key(token))
            .await
            .map_err(from_redis_error)?;

        match data {
            Some(raw) => {
                let stored: StoredSession =
                    serde_json::from_str(&raw).map_err(from_serde_error)?;
                Ok(Some(stored.into_session(token)))
            }
            None => Ok(None),
        }
    }

    async fn scan_count(&self, pattern: &str) -> StorageResult<u64> {
        let mut scanner = self.client.scan(pattern, None, None);
        let mut count = 0u64;

        while let Some(result) = scanner.try_next().await.map_err(from_redis_error)? {
            if let Some(page) = result.results() {
                count += page.len() as u64;
            }
        }

        Ok(count)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        let ttl = Self::ttl_seconds(session);
        self.write_session(session, ttl, true).await?;

        let user_key = self.user_key(session.user_id);
        self.client
            .sadd::<(), _, _>(&user_key, session.token.clone())
            .await
            .map_err(from_redis_error)?;

        // The set key is an index; refresh its bound on every login.
        self.client
            .expire::<(), _>(&user_key, self.config.user_set_ttl_secs, None)
            .await
            .map_err(from_redis_error)?;

        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> StorageResult<Option<Session>> {
        self.read_session(token).await
    }

    async fn get_by_user(&self, user_id: Uuid) -> StorageResult<Vec<Session>> {
        let user_key = self.user_key(user_id);
        let tokens: Vec<String> = self
            .client
            .smembers(&user_key)
            .await
            .map_err(from_redis_error)?;

        let mut sessions = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.read_session(&token).await? {
                Some(session) => sessions.push(session),
                None => {
                    // TTL already reaped the session; repair the index.
                    self.client
                        .srem::<(), _, _>(&user_key, token)
                        .await
                        .map_err(from_redis_error)?;
                }
            }
        }

        Ok(sessions)
    }

    async fn update(&self, session: &Session) -> StorageResult<()> {
        let ttl = Self::ttl_seconds(session);
        self.write_session(session, ttl, false).await
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        let token: Option<String> = self
            .client
            .get(self.id_key(id))
            .await
            .map_err(from_redis_error)?;

        match token {
            Some(token) => self.delete_by_token(&token).await,
            None => Ok(()),
        }
    }

    async fn delete_by_token(&self, token: &str) -> StorageResult<()> {
        let Some(session) = self.read_session(token).await? else {
            // Already gone
            return Ok(());
        };

        self.client
            .del::<(), _>(self.session_key(token))
            .await
            .map_err(from_redis_error)?;
        self.client
            .del::<(), _>(self.id_key(session.id))
            .await
            .map_err(from_redis_error)?;
        self.client
            .srem::<(), _, _>(self.user_key(session.user_id), token.to_string())
            .await
            .map_err(from_redis_error)?;

        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<()> {
        let user_key = self.user_key(user_id);
        let tokens: Vec<String> = self
            .client
            .smembers(&user_key)
            .await
            .map_err(from_redis_error)?;

        for token in &tokens {
            if let Some(session) = self.read_session(token).await? {
                self.client
                    .del::<(), _>(self.id_key(session.id))
                    .await
                    .map_err(from_redis_error)?;
            }
            self.client
                .del::<(), _>(self.session_key(token))
                .await
                .map_err(from_redis_error)?;
        }

        self.client
            .del::<(), _>(&user_key)
            .await
            .map_err(from_redis_error)?;

        Ok(())
    }

    async fn delete_expired(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
        // Redis TTL handles expiry natively.
        Ok(0)
    }

    async fn count_active(&self, _now: DateTime<Utc>) -> StorageResult<u64> {
        let pattern = self.config.prefixed_key("session:*");
        self.scan_count(&pattern).await
    }
}

/// On-the-wire session encoding.
///
/// The token is the key, not part of the value, so a leaked value dump does
/// not hand out bearer credentials.
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredSession {
    id: Uuid,
    user_id: Uuid,
    ip_address: String,
    user_agent: String,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            user_id: session.user_id,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            expires_at: session.expires_at,
            last_activity_at: session.last_activity_at,
            created_at: session.created_at,
        }
    }
}

impl StoredSession {
    fn into_session(self, token: &str) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            token: token.to_string(),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            expires_at: self.expires_at,
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stored_session_round_trip_excludes_token() {
        let session = Session::new(
            Uuid::now_v7(),
            "secret-token".to_string(),
            "127.0.0.1",
            "agent",
            Duration::from_secs(3600),
        );

        let raw = serde_json::to_string(&StoredSession::from(&session)).unwrap();
        assert!(!raw.contains("secret-token"));

        let stored: StoredSession = serde_json::from_str(&raw).unwrap();
        let restored = stored.into_session("secret-token");

        assert_eq!(restored.id, session.id);
        assert_eq!(restored.user_id, session.user_id);
        assert_eq!(restored.token, "secret-token");
    }

    #[test]
    fn ttl_is_floored_at_one_second() {
        let expired = Session::new(
            Uuid::now_v7(),
            "t".to_string(),
            "127.0.0.1",
            "agent",
            Duration::ZERO,
        );
        assert_eq!(RedisSessionStore::ttl_seconds(&expired), 1);

        let live = Session::new(
            Uuid::now_v7(),
            "t".to_string(),
            "127.0.0.1",
            "agent",
            Duration::from_secs(600),
        );
        assert!(RedisSessionStore::ttl_seconds(&live) > 590);
    }
}
