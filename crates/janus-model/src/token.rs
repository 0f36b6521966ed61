//! Authorization codes, token records and the consent ledger.

use chrono::{DateTime, Utc};
use janus_crypto::CodeChallengeMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A one-shot authorization code.
///
/// State machine: `issued → used` (terminal) or `issued → expired`
/// (terminal). Redemption is a single conditional update at the store; a
/// second redemption must fail and revokes the tokens minted by the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// Internal identifier; token records reference it for replay revocation.
    pub id: Uuid,
    /// The code value handed to the user agent. Never serialized outward.
    #[serde(skip_serializing)]
    pub code: String,
    /// Client the code is bound to.
    pub client_id: String,
    /// Principal that granted the authorization.
    pub user_id: Uuid,
    /// Redirect URI the code is bound to (must match at redemption).
    pub redirect_uri: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// PKCE challenge, when the request carried one.
    pub code_challenge: Option<String>,
    /// PKCE challenge method, recorded alongside the challenge.
    pub code_challenge_method: Option<CodeChallengeMethod>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been redeemed.
    pub used: bool,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    /// Checks whether the code has expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Stored metadata for a signed access token.
///
/// The bearer string is a signed JWT and is never stored; `token_hash` is
/// `SHA256(token)` and gives the server revocation authority over tokens it
/// could otherwise only verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRecord {
    /// Internal identifier.
    pub id: Uuid,
    /// Hex-encoded SHA-256 of the bearer string.
    pub token_hash: String,
    /// Issuing client.
    pub client_id: String,
    /// Subject; absent for client-credentials tokens.
    pub user_id: Option<Uuid>,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Authorization code this token derives from, for replay revocation.
    pub auth_code_id: Option<Uuid>,
    /// Hard expiry, mirroring the JWT `exp` claim.
    pub expires_at: DateTime<Utc>,
    /// When the token was minted.
    pub created_at: DateTime<Utc>,
}

/// Stored metadata for an opaque refresh token.
///
/// State machine: `issued → revoked` (terminal) or `issued → expired`
/// (terminal). Rotation revokes the presented token only after the new pair
/// is persisted. The token itself is stored hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Internal identifier.
    pub id: Uuid,
    /// Hex-encoded SHA-256 of the opaque token.
    pub token_hash: String,
    /// Access token minted alongside this refresh token.
    pub access_token_id: Option<Uuid>,
    /// Authorization code this token derives from, for replay revocation.
    pub auth_code_id: Option<Uuid>,
    /// Issuing client.
    pub client_id: String,
    /// Subject.
    pub user_id: Uuid,
    /// Granted scopes, carried forward on rotation.
    pub scopes: Vec<String>,
    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
    /// Terminal revocation flag.
    pub revoked: bool,
    /// When the token was minted.
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Checks whether the token has expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks whether the token can still be presented.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

/// A consent ledger entry, keyed uniquely by (principal, client).
///
/// Scope updates use replacement semantics: a re-grant overwrites the
/// stored set with exactly the newly approved one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    /// Granting principal.
    pub user_id: Uuid,
    /// Client the grant applies to.
    pub client_id: String,
    /// The granted scope set.
    pub scopes: Vec<String>,
    /// First grant.
    pub granted_at: DateTime<Utc>,
    /// Most recent update.
    pub updated_at: DateTime<Utc>,
}

impl Consent {
    /// Creates a fresh consent entry.
    #[must_use]
    pub fn new(user_id: Uuid, client_id: impl Into<String>, scopes: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            client_id: client_id.into(),
            scopes,
            granted_at: now,
            updated_at: now,
        }
    }

    /// Returns the requested scopes not covered by this grant.
    #[must_use]
    pub fn missing_scopes(&self, requested: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|s| !self.scopes.contains(s))
            .cloned()
            .collect()
    }

    /// Checks whether this grant covers the entire requested set.
    #[must_use]
    pub fn covers(&self, requested: &[String]) -> bool {
        self.missing_scopes(requested).is_empty()
    }
}

/// Builds an authorization code record.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn new_authorization_code(
    code: String,
    client_id: impl Into<String>,
    user_id: Uuid,
    redirect_uri: impl Into<String>,
    scopes: Vec<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<CodeChallengeMethod>,
    ttl: Duration,
) -> AuthorizationCode {
    let now = Utc::now();
    AuthorizationCode {
        id: Uuid::now_v7(),
        code,
        client_id: client_id.into(),
        user_id,
        redirect_uri: redirect_uri.into(),
        scopes,
        code_challenge,
        code_challenge_method,
        expires_at: now + ttl,
        used: false,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_code_is_unused_and_valid() {
        let code = new_authorization_code(
            "code".to_string(),
            "client-1",
            Uuid::now_v7(),
            "http://app/cb",
            vec!["openid".to_string()],
            None,
            None,
            Duration::from_secs(600),
        );

        assert!(!code.used);
        assert!(!code.is_expired(Utc::now()));
    }

    #[test]
    fn refresh_token_usability() {
        let now = Utc::now();
        let mut token = RefreshTokenRecord {
            id: Uuid::now_v7(),
            token_hash: "hash".to_string(),
            access_token_id: None,
            auth_code_id: None,
            client_id: "client-1".to_string(),
            user_id: Uuid::now_v7(),
            scopes: vec![],
            expires_at: now + chrono::Duration::hours(1),
            revoked: false,
            created_at: now,
        };

        assert!(token.is_usable(now));

        token.revoked = true;
        assert!(!token.is_usable(now));

        token.revoked = false;
        token.expires_at = now - chrono::Duration::seconds(1);
        assert!(!token.is_usable(now));
    }

    #[test]
    fn consent_scope_coverage() {
        let consent = Consent::new(
            Uuid::now_v7(),
            "client-1",
            vec!["openid".to_string(), "profile".to_string()],
        );

        assert!(consent.covers(&["openid".to_string()]));
        assert!(consent.covers(&[]));
        assert_eq!(
            consent.missing_scopes(&["openid".to_string(), "email".to_string()]),
            vec!["email".to_string()]
        );
    }
}
