//! Access token claim set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by a signed access token.
///
/// `sub` is absent for client-credentials tokens, which represent the
/// client itself rather than a principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject (principal id), absent for client-credentials tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Client the token was issued to.
    pub client_id: String,

    /// Space-separated granted scopes.
    pub scope: String,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds).
    pub exp: i64,

    /// Not-before (unix seconds).
    pub nbf: i64,

    /// Token identifier.
    pub jti: String,
}

impl AccessTokenClaims {
    /// Builds a claim set valid from `issued_at` to `expires_at`.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: Option<String>,
        client_id: impl Into<String>,
        scope: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        jti: impl Into<String>,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject,
            client_id: client_id.into(),
            scope: scope.into(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            nbf: issued_at.timestamp(),
            jti: jti.into(),
        }
    }

    /// Returns the granted scopes as a list.
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        crate::parse_scopes(&self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn claims_serialize_without_null_sub() {
        let now = Utc::now();
        let claims = AccessTokenClaims::new(
            "http://localhost:8080",
            None,
            "client-1",
            "openid",
            now,
            now + Duration::hours(1),
            "jti-1",
        );

        let json = serde_json::to_string(&claims).unwrap();
        assert!(!json.contains("\"sub\""));
        assert!(json.contains("\"client_id\":\"client-1\""));
    }

    #[test]
    fn nbf_matches_iat() {
        let now = Utc::now();
        let claims = AccessTokenClaims::new(
            "iss",
            Some("user-1".to_string()),
            "client-1",
            "openid profile",
            now,
            now + Duration::hours(1),
            "jti-1",
        );

        assert_eq!(claims.nbf, claims.iat);
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.scopes(), vec!["openid", "profile"]);
    }
}
