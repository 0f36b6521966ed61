//! Database entity types for `SQLx`.
//!
//! These map directly to database rows and convert to/from domain models.
//! Scope and redirect-URI lists are stored as JSON arrays.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use janus_model::{
    AccessTokenRecord, AuthorizationCode, Consent, GrantType, OAuth2Client, PasswordHistoryEntry,
    PasswordResetTicket, RefreshTokenRecord, Session, TwoFactor, User,
};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for users.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
    pub password_hash: String,
    pub password_changed_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_locked: bool,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            email_verified: row.email_verified,
            password_hash: row.password_hash,
            password_changed_at: row.password_changed_at,
            is_active: row.is_active,
            is_locked: row.is_locked,
            failed_attempts: row.failed_attempts,
            locked_until: row.locked_until,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for two-factor enrollments.
#[derive(Debug, Clone, FromRow)]
pub struct TwoFactorRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub secret: String,
    pub enabled: bool,
    pub enabled_at: Option<DateTime<Utc>>,
    pub backup_code_hashes: sqlx::types::Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<TwoFactorRow> for TwoFactor {
    fn from(row: TwoFactorRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            secret: row.secret,
            enabled: row.enabled,
            enabled_at: row.enabled_at,
            backup_code_hashes: row.backup_code_hashes.0,
            created_at: row.created_at,
        }
    }
}

/// Database row for sessions.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            last_activity_at: row.last_activity_at,
            created_at: row.created_at,
        }
    }
}

/// Database row for password reset tickets.
#[derive(Debug, Clone, FromRow)]
pub struct ResetTicketRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ResetTicketRow> for PasswordResetTicket {
    fn from(row: ResetTicketRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            token: row.token,
            expires_at: row.expires_at,
            used: row.used,
            used_at: row.used_at,
            created_at: row.created_at,
        }
    }
}

/// Database row for password history entries.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub user_id: Uuid,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryRow> for PasswordHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            user_id: row.user_id,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

/// Database row for OAuth2 clients.
#[derive(Debug, Clone, FromRow)]
#[allow(clippy::struct_excessive_bools)]
pub struct ClientRow {
    pub id: Uuid,
    pub client_id: String,
    pub client_secret_hash: Option<String>,
    pub name: String,
    pub description: String,
    pub redirect_uris: sqlx::types::Json<Vec<String>>,
    pub allowed_scopes: sqlx::types::Json<Vec<String>>,
    pub grant_types: sqlx::types::Json<Vec<String>>,
    pub is_public: bool,
    pub is_active: bool,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientRow> for OAuth2Client {
    fn from(row: ClientRow) -> Self {
        let grant_types = row
            .grant_types
            .0
            .iter()
            .filter_map(|g| GrantType::parse(g))
            .collect();

        Self {
            id: row.id,
            client_id: row.client_id,
            client_secret_hash: row.client_secret_hash,
            name: row.name,
            description: row.description,
            redirect_uris: row.redirect_uris.0,
            allowed_scopes: row.allowed_scopes.0,
            grant_types,
            is_public: row.is_public,
            is_active: row.is_active,
            owner_user_id: row.owner_user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Serializes grant types for storage.
pub fn grant_types_to_json(grant_types: &[GrantType]) -> Vec<String> {
    grant_types.iter().map(|g| g.as_str().to_string()).collect()
}

/// Database row for authorization codes.
#[derive(Debug, Clone, FromRow)]
pub struct CodeRow {
    pub id: Uuid,
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub redirect_uri: String,
    pub scopes: sqlx::types::Json<Vec<String>>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CodeRow> for AuthorizationCode {
    fn from(row: CodeRow) -> Self {
        let code_challenge_method = row
            .code_challenge_method
            .as_deref()
            .and_then(|m| janus_crypto_method(m));

        Self {
            id: row.id,
            code: row.code,
            client_id: row.client_id,
            user_id: row.user_id,
            redirect_uri: row.redirect_uri,
            scopes: row.scopes.0,
            code_challenge: row.code_challenge,
            code_challenge_method,
            expires_at: row.expires_at,
            used: row.used,
            created_at: row.created_at,
        }
    }
}

fn janus_crypto_method(raw: &str) -> Option<janus_crypto::CodeChallengeMethod> {
    janus_crypto::CodeChallengeMethod::from_str(raw).ok()
}

/// Database row for access token records.
#[derive(Debug, Clone, FromRow)]
pub struct AccessTokenRow {
    pub id: Uuid,
    pub token_hash: String,
    pub client_id: String,
    pub user_id: Option<Uuid>,
    pub scopes: sqlx::types::Json<Vec<String>>,
    pub auth_code_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<AccessTokenRow> for AccessTokenRecord {
    fn from(row: AccessTokenRow) -> Self {
        Self {
            id: row.id,
            token_hash: row.token_hash,
            client_id: row.client_id,
            user_id: row.user_id,
            scopes: row.scopes.0,
            auth_code_id: row.auth_code_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

/// Database row for refresh token records.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub token_hash: String,
    pub access_token_id: Option<Uuid>,
    pub auth_code_id: Option<Uuid>,
    pub client_id: String,
    pub user_id: Uuid,
    pub scopes: sqlx::types::Json<Vec<String>>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            token_hash: row.token_hash,
            access_token_id: row.access_token_id,
            auth_code_id: row.auth_code_id,
            client_id: row.client_id,
            user_id: row.user_id,
            scopes: row.scopes.0,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
        }
    }
}

/// Database row for consent ledger entries.
#[derive(Debug, Clone, FromRow)]
pub struct ConsentRow {
    pub user_id: Uuid,
    pub client_id: String,
    pub scopes: sqlx::types::Json<Vec<String>>,
    pub granted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConsentRow> for Consent {
    fn from(row: ConsentRow) -> Self {
        Self {
            user_id: row.user_id,
            client_id: row.client_id,
            scopes: row.scopes.0,
            granted_at: row.granted_at,
            updated_at: row.updated_at,
        }
    }
}
