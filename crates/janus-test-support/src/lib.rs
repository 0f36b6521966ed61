//! # janus-test-support
//!
//! In-memory implementations of the janus storage contracts, for exercising
//! the service layer without PostgreSQL or Redis. Dev-dependency only -
//! never wired into the server.
//!
//! The implementations honor the concurrency-sensitive parts of the
//! contracts (atomic counter increment, one-shot redemption, conditional
//! revocation) by holding a mutex across the read-and-write, which is the
//! in-process equivalent of the backends' conditional updates.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_core::AuditEvent;
use janus_model::{
    AccessTokenRecord, AuthorizationCode, Consent, OAuth2Client, PasswordHistoryEntry,
    PasswordResetTicket, RefreshTokenRecord, Session, TwoFactor, User,
};
use janus_storage::error::{StorageError, StorageResult};
use janus_storage::{
    AuditStore, ClientProvider, CodeProvider, ConsentProvider, PasswordHistoryProvider,
    ResetTicketProvider, ScopeProvider, SessionStore, TokenProvider, UserProvider,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// In-memory user and two-factor provider.
#[derive(Default)]
pub struct MemoryUserProvider {
    users: Mutex<HashMap<Uuid, User>>,
    two_factor: Mutex<HashMap<Uuid, TwoFactor>>,
}

impl MemoryUserProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a user, returning its id.
    pub fn seed(&self, user: User) -> Uuid {
        let id = user.id;
        self.users.lock().insert(id, user);
        id
    }

    /// Reads a user back for assertions.
    pub fn snapshot(&self, id: Uuid) -> Option<User> {
        self.users.lock().get(&id).cloned()
    }
}

#[async_trait]
impl UserProvider for MemoryUserProvider {
    async fn create(&self, user: &User) -> StorageResult<()> {
        let mut users = self.users.lock();
        if users.values().any(|u| u.email == user.email) {
            return Err(StorageError::duplicate("User", "email"));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> StorageResult<()> {
        let mut users = self.users.lock();
        let existing = users
            .get_mut(&user.id)
            .ok_or(StorageError::not_found("User", user.id))?;
        existing.email = user.email.clone();
        existing.name = user.name.clone();
        existing.email_verified = user.email_verified;
        existing.is_active = user.is_active;
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StorageResult<Option<User>> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.password_hash = password_hash.to_string();
        user.password_changed_at = changed_at;
        Ok(())
    }

    async fn increment_failed_attempts(&self, id: Uuid) -> StorageResult<i32> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.failed_attempts += 1;
        Ok(user.failed_attempts)
    }

    async fn reset_failed_attempts(&self, id: Uuid) -> StorageResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.failed_attempts = 0;
        Ok(())
    }

    async fn lock(&self, id: Uuid, until: DateTime<Utc>) -> StorageResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.is_locked = true;
        user.locked_until = Some(until);
        Ok(())
    }

    async fn clear_lock(&self, id: Uuid) -> StorageResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.is_locked = false;
        user.locked_until = None;
        user.failed_attempts = 0;
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&id)
            .ok_or(StorageError::not_found("User", id))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn get_two_factor(&self, user_id: Uuid) -> StorageResult<Option<TwoFactor>> {
        Ok(self.two_factor.lock().get(&user_id).cloned())
    }

    async fn upsert_two_factor(&self, enrollment: &TwoFactor) -> StorageResult<()> {
        self.two_factor
            .lock()
            .insert(enrollment.user_id, enrollment.clone());
        Ok(())
    }

    async fn enable_two_factor(&self, user_id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        let mut map = self.two_factor.lock();
        let enrollment = map
            .get_mut(&user_id)
            .ok_or(StorageError::not_found("TwoFactor", user_id))?;
        enrollment.enabled = true;
        enrollment.enabled_at = Some(at);
        Ok(())
    }

    async fn disable_two_factor(&self, user_id: Uuid) -> StorageResult<()> {
        if let Some(enrollment) = self.two_factor.lock().get_mut(&user_id) {
            enrollment.enabled = false;
            enrollment.enabled_at = None;
        }
        Ok(())
    }

    async fn update_backup_codes(&self, user_id: Uuid, hashes: &[String]) -> StorageResult<()> {
        let mut map = self.two_factor.lock();
        let enrollment = map
            .get_mut(&user_id)
            .ok_or(StorageError::not_found("TwoFactor", user_id))?;
        enrollment.backup_code_hashes = hashes.to_vec();
        Ok(())
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of stored sessions, expired included.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// True when no sessions are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> StorageResult<()> {
        let mut sessions = self.sessions.lock();
        if sessions.values().any(|s| s.token == session.token) {
            return Err(StorageError::duplicate("Session", "token"));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> StorageResult<Option<Session>> {
        Ok(self
            .sessions
            .lock()
            .values()
            .find(|s| s.token == token)
            .cloned())
    }

    async fn get_by_user(&self, user_id: Uuid) -> StorageResult<Vec<Session>> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update(&self, session: &Session) -> StorageResult<()> {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(&session.id) {
            return Err(StorageError::not_found("Session", session.id));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StorageResult<()> {
        self.sessions.lock().remove(&id);
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> StorageResult<()> {
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, s| s.token != token);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> StorageResult<()> {
        self.sessions.lock().retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn count_active(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        Ok(self
            .sessions
            .lock()
            .values()
            .filter(|s| !s.is_expired(now))
            .count() as u64)
    }
}

/// In-memory reset ticket provider.
#[derive(Default)]
pub struct MemoryResetTicketProvider {
    tickets: Mutex<HashMap<String, PasswordResetTicket>>,
}

impl MemoryResetTicketProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ResetTicketProvider for MemoryResetTicketProvider {
    async fn create(&self, ticket: &PasswordResetTicket) -> StorageResult<()> {
        self.tickets
            .lock()
            .insert(ticket.token.clone(), ticket.clone());
        Ok(())
    }

    async fn get_by_token(&self, token: &str) -> StorageResult<Option<PasswordResetTicket>> {
        Ok(self.tickets.lock().get(token).cloned())
    }

    async fn mark_used(&self, token: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let mut tickets = self.tickets.lock();
        let ticket = tickets
            .get_mut(token)
            .ok_or(StorageError::not_found_by_key("PasswordResetTicket"))?;
        ticket.used = true;
        ticket.used_at = Some(at);
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut tickets = self.tickets.lock();
        let before = tickets.len();
        tickets.retain(|_, t| !t.is_expired(now));
        Ok((before - tickets.len()) as u64)
    }
}

/// In-memory password history provider.
#[derive(Default)]
pub struct MemoryPasswordHistoryProvider {
    entries: Mutex<Vec<PasswordHistoryEntry>>,
}

impl MemoryPasswordHistoryProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of stored entries for a user.
    pub fn count_for(&self, user_id: Uuid) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl PasswordHistoryProvider for MemoryPasswordHistoryProvider {
    async fn append(&self, entry: &PasswordHistoryEntry) -> StorageResult<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }

    async fn recent(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> StorageResult<Vec<PasswordHistoryEntry>> {
        let mut entries: Vec<PasswordHistoryEntry> = self
            .entries
            .lock()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn prune(&self, user_id: Uuid, keep: usize) -> StorageResult<u64> {
        let keep_set: Vec<DateTime<Utc>> = {
            let mut stamps: Vec<DateTime<Utc>> = self
                .entries
                .lock()
                .iter()
                .filter(|e| e.user_id == user_id)
                .map(|e| e.created_at)
                .collect();
            stamps.sort_by(|a, b| b.cmp(a));
            stamps.truncate(keep);
            stamps
        };

        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.user_id != user_id || keep_set.contains(&e.created_at));
        Ok((before - entries.len()) as u64)
    }
}

/// In-memory OAuth2 client provider.
#[derive(Default)]
pub struct MemoryClientProvider {
    clients: Mutex<HashMap<String, OAuth2Client>>,
}

impl MemoryClientProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ClientProvider for MemoryClientProvider {
    async fn create(&self, client: &OAuth2Client) -> StorageResult<()> {
        let mut clients = self.clients.lock();
        if clients.contains_key(&client.client_id) {
            return Err(StorageError::duplicate("OAuth2Client", "client_id"));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_by_client_id(&self, client_id: &str) -> StorageResult<Option<OAuth2Client>> {
        Ok(self.clients.lock().get(client_id).cloned())
    }

    async fn update(&self, client: &OAuth2Client) -> StorageResult<()> {
        let mut clients = self.clients.lock();
        if !clients.contains_key(&client.client_id) {
            return Err(StorageError::not_found_by_key("OAuth2Client"));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn deactivate(&self, client_id: &str) -> StorageResult<()> {
        let mut clients = self.clients.lock();
        let client = clients
            .get_mut(client_id)
            .ok_or(StorageError::not_found_by_key("OAuth2Client"))?;
        client.is_active = false;
        Ok(())
    }
}

/// In-memory authorization code provider.
#[derive(Default)]
pub struct MemoryCodeProvider {
    codes: Mutex<HashMap<String, AuthorizationCode>>,
}

impl MemoryCodeProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CodeProvider for MemoryCodeProvider {
    async fn create(&self, code: &AuthorizationCode) -> StorageResult<()> {
        self.codes.lock().insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        Ok(self.codes.lock().get(code).cloned())
    }

    async fn redeem(&self, code: &str) -> StorageResult<bool> {
        // Check-and-set under one lock: the in-process equivalent of the
        // conditional UPDATE.
        let mut codes = self.codes.lock();
        match codes.get_mut(code) {
            Some(record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut codes = self.codes.lock();
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired(now));
        Ok((before - codes.len()) as u64)
    }
}

/// In-memory token record provider.
#[derive(Default)]
pub struct MemoryTokenProvider {
    access: Mutex<HashMap<String, AccessTokenRecord>>,
    refresh: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl MemoryTokenProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of live (non-revoked) refresh tokens.
    pub fn live_refresh_count(&self) -> usize {
        self.refresh.lock().values().filter(|t| !t.revoked).count()
    }
}

#[async_trait]
impl TokenProvider for MemoryTokenProvider {
    async fn create_access_token(&self, token: &AccessTokenRecord) -> StorageResult<()> {
        self.access
            .lock()
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn get_access_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<AccessTokenRecord>> {
        Ok(self.access.lock().get(token_hash).cloned())
    }

    async fn delete_access_token_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        Ok(self.access.lock().remove(token_hash).is_some())
    }

    async fn create_refresh_token(&self, token: &RefreshTokenRecord) -> StorageResult<()> {
        self.refresh
            .lock()
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn get_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        Ok(self.refresh.lock().get(token_hash).cloned())
    }

    async fn revoke_refresh_token_by_hash(&self, token_hash: &str) -> StorageResult<bool> {
        let mut refresh = self.refresh.lock();
        match refresh.get_mut(token_hash) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_by_auth_code(&self, auth_code_id: Uuid) -> StorageResult<u64> {
        let mut touched = 0u64;

        let mut access = self.access.lock();
        let before = access.len();
        access.retain(|_, t| t.auth_code_id != Some(auth_code_id));
        touched += (before - access.len()) as u64;
        drop(access);

        let mut refresh = self.refresh.lock();
        for record in refresh.values_mut() {
            if record.auth_code_id == Some(auth_code_id) && !record.revoked {
                record.revoked = true;
                touched += 1;
            }
        }

        Ok(touched)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let mut touched = 0u64;

        let mut access = self.access.lock();
        let before = access.len();
        access.retain(|_, t| t.user_id != Some(user_id));
        touched += (before - access.len()) as u64;
        drop(access);

        let mut refresh = self.refresh.lock();
        for record in refresh.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                touched += 1;
            }
        }

        Ok(touched)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut removed = 0u64;

        let mut access = self.access.lock();
        let before = access.len();
        access.retain(|_, t| t.expires_at > now);
        removed += (before - access.len()) as u64;
        drop(access);

        let mut refresh = self.refresh.lock();
        let before = refresh.len();
        refresh.retain(|_, t| t.expires_at > now);
        removed += (before - refresh.len()) as u64;

        Ok(removed)
    }
}

/// In-memory consent ledger.
#[derive(Default)]
pub struct MemoryConsentProvider {
    consents: Mutex<HashMap<(Uuid, String), Consent>>,
}

impl MemoryConsentProvider {
    /// Creates an empty provider.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ConsentProvider for MemoryConsentProvider {
    async fn upsert(&self, consent: &Consent) -> StorageResult<()> {
        self.consents.lock().insert(
            (consent.user_id, consent.client_id.clone()),
            consent.clone(),
        );
        Ok(())
    }

    async fn get(&self, user_id: Uuid, client_id: &str) -> StorageResult<Option<Consent>> {
        Ok(self
            .consents
            .lock()
            .get(&(user_id, client_id.to_string()))
            .cloned())
    }

    async fn revoke(&self, user_id: Uuid, client_id: &str) -> StorageResult<()> {
        self.consents
            .lock()
            .remove(&(user_id, client_id.to_string()));
        Ok(())
    }
}

/// In-memory scope registry.
pub struct MemoryScopeProvider {
    scopes: Mutex<Vec<String>>,
}

impl MemoryScopeProvider {
    /// Creates a registry holding the given scope names.
    pub fn with_scopes(scopes: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            scopes: Mutex::new(scopes.iter().map(ToString::to_string).collect()),
        })
    }
}

#[async_trait]
impl ScopeProvider for MemoryScopeProvider {
    async fn all_exist(&self, scopes: &[String]) -> StorageResult<bool> {
        let known = self.scopes.lock();
        Ok(scopes.iter().all(|s| known.contains(s)))
    }
}

/// In-memory audit store.
#[derive(Default)]
pub struct MemoryAuditStore {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditStore {
    /// Creates an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded action names in order.
    pub fn actions(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.action.as_str()).collect()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: &AuditEvent) -> StorageResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
