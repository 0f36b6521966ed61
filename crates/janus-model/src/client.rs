//! OAuth2 client model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth2 grant types a client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code flow (with PKCE for public clients).
    AuthorizationCode,
    /// Refresh token grant.
    RefreshToken,
    /// Client credentials grant.
    ClientCredentials,
}

impl GrantType {
    /// Returns the wire name of the grant type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            "client_credentials" => Some(Self::ClientCredentials),
            _ => None,
        }
    }
}

/// A registered OAuth2 client.
///
/// Public clients (`is_public = true`) hold no secret and must present a
/// PKCE verifier at redemption. Confidential clients authenticate with a
/// secret that is stored only as a password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Client {
    /// Internal identifier.
    pub id: Uuid,
    /// Public client identifier presented on the wire.
    pub client_id: String,
    /// Hash of the client secret; absent exactly when the client is public.
    #[serde(skip_serializing)]
    pub client_secret_hash: Option<String>,
    /// Human-readable name shown on the consent prompt.
    pub name: String,
    /// Description shown on the consent prompt.
    pub description: String,
    /// Exact-match set of allowed redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request.
    pub allowed_scopes: Vec<String>,
    /// Grant types the client may use.
    pub grant_types: Vec<GrantType>,
    /// Whether the client is public (no secret).
    pub is_public: bool,
    /// Soft-revocation flag; inactive clients fail all token operations.
    pub is_active: bool,
    /// Principal that owns the registration, if any.
    pub owner_user_id: Option<Uuid>,
    /// When the client was registered.
    pub created_at: DateTime<Utc>,
    /// When the client was last updated.
    pub updated_at: DateTime<Utc>,
}

impl OAuth2Client {
    /// Checks whether a redirect URI is registered (exact string match).
    #[must_use]
    pub fn allows_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Checks whether every requested scope is allowed.
    ///
    /// An empty request is allowed.
    #[must_use]
    pub fn allows_scopes(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|s| self.allowed_scopes.contains(s))
    }

    /// Checks whether the client may use a grant type.
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuth2Client {
        let now = Utc::now();
        OAuth2Client {
            id: Uuid::now_v7(),
            client_id: "client-1".to_string(),
            client_secret_hash: None,
            name: "Test App".to_string(),
            description: String::new(),
            redirect_uris: vec!["http://app/cb".to_string()],
            allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            is_public: true,
            is_active: true,
            owner_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn redirect_uri_is_exact_match() {
        let client = client();
        assert!(client.allows_redirect_uri("http://app/cb"));
        assert!(!client.allows_redirect_uri("http://app/cb/"));
        assert!(!client.allows_redirect_uri("http://app/cb?x=1"));
        assert!(!client.allows_redirect_uri("http://evil/cb"));
    }

    #[test]
    fn scope_subset_check() {
        let client = client();
        assert!(client.allows_scopes(&[]));
        assert!(client.allows_scopes(&["openid".to_string()]));
        assert!(client.allows_scopes(&["openid".to_string(), "profile".to_string()]));
        assert!(!client.allows_scopes(&["admin".to_string()]));
    }

    #[test]
    fn grant_type_parsing_round_trips() {
        for gt in [
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::ClientCredentials,
        ] {
            assert_eq!(GrantType::parse(gt.as_str()), Some(gt));
        }
        assert_eq!(GrantType::parse("password"), None);
        assert_eq!(GrantType::parse("implicit"), None);
    }

    #[test]
    fn grant_type_membership() {
        let client = client();
        assert!(client.allows_grant_type(GrantType::AuthorizationCode));
        assert!(!client.allows_grant_type(GrantType::ClientCredentials));
    }
}
