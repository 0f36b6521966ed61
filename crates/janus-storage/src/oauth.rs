//! OAuth2 storage provider traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use janus_model::{AccessTokenRecord, AuthorizationCode, Consent, OAuth2Client, RefreshTokenRecord};
use uuid::Uuid;

use crate::error::StorageResult;

/// Provider for registered OAuth2 clients.
#[async_trait]
pub trait ClientProvider: Send + Sync {
    /// Persists a new client.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Duplicate` if the client id is taken.
    async fn create(&self, client: &OAuth2Client) -> StorageResult<()>;

    /// Gets a client by its public client identifier.
    async fn get_by_client_id(&self, client_id: &str) -> StorageResult<Option<OAuth2Client>>;

    /// Replaces a client record.
    async fn update(&self, client: &OAuth2Client) -> StorageResult<()>;

    /// Soft-revokes a client (`is_active = false`).
    async fn deactivate(&self, client_id: &str) -> StorageResult<()>;
}

/// Provider for one-shot authorization codes.
#[async_trait]
pub trait CodeProvider: Send + Sync {
    /// Persists a new code.
    async fn create(&self, code: &AuthorizationCode) -> StorageResult<()>;

    /// Gets a code record by its code value.
    async fn get_by_code(&self, code: &str) -> StorageResult<Option<AuthorizationCode>>;

    /// Atomically transitions a code from unused to used.
    ///
    /// The canonical form is `SET used = true WHERE code = ? AND used =
    /// false` with the affected-row count observed. Returns `true` exactly
    /// when this call performed the transition; a concurrent redeemer gets
    /// `false`.
    async fn redeem(&self, code: &str) -> StorageResult<bool>;

    /// Removes expired codes. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Provider for access and refresh token records.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Persists an access token record.
    async fn create_access_token(&self, token: &AccessTokenRecord) -> StorageResult<()>;

    /// Gets an access token record by its hash.
    async fn get_access_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<AccessTokenRecord>>;

    /// Deletes an access token record by its hash.
    ///
    /// Returns `true` if a record was deleted.
    async fn delete_access_token_by_hash(&self, token_hash: &str) -> StorageResult<bool>;

    /// Persists a refresh token record.
    async fn create_refresh_token(&self, token: &RefreshTokenRecord) -> StorageResult<()>;

    /// Gets a refresh token record by its hash.
    async fn get_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>>;

    /// Marks a refresh token revoked by its hash.
    ///
    /// Returns `true` if a live record transitioned; already-revoked and
    /// unknown tokens return `false` without error.
    async fn revoke_refresh_token_by_hash(&self, token_hash: &str) -> StorageResult<bool>;

    /// Revokes every token minted from the given authorization code.
    ///
    /// Replay defense: deletes matching access token records and revokes
    /// matching refresh tokens. Returns the number of rows touched.
    async fn revoke_by_auth_code(&self, auth_code_id: Uuid) -> StorageResult<u64>;

    /// Revokes every token belonging to a principal.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> StorageResult<u64>;

    /// Removes expired token records. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// Provider for the consent ledger.
#[async_trait]
pub trait ConsentProvider: Send + Sync {
    /// Creates or replaces the consent for (principal, client).
    ///
    /// Replacement semantics: the stored scope set becomes exactly the one
    /// in `consent`.
    async fn upsert(&self, consent: &Consent) -> StorageResult<()>;

    /// Gets the consent for (principal, client), if any.
    async fn get(&self, user_id: Uuid, client_id: &str) -> StorageResult<Option<Consent>>;

    /// Removes the consent for (principal, client).
    async fn revoke(&self, user_id: Uuid, client_id: &str) -> StorageResult<()>;
}

/// Provider for the scope registry.
///
/// Client registration validates requested scopes against this set.
#[async_trait]
pub trait ScopeProvider: Send + Sync {
    /// Checks that every named scope exists.
    async fn all_exist(&self, scopes: &[String]) -> StorageResult<bool>;
}
