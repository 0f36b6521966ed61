//! The token endpoint grants, revocation and bearer introspection.
//!
//! Redemption, rotation and revocation all run against hashed token
//! storage: the server can always tell whether it minted a token, and can
//! always take one back, without ever storing a bearer string.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janus_crypto::pkce::verify_code_challenge;
use janus_crypto::random::generate_refresh_token;
use janus_crypto::{CodeChallengeMethod, sha256_hex};
use janus_model::{AccessTokenRecord, GrantType, OAuth2Client, RefreshTokenRecord};
use janus_storage::{CodeProvider, TokenProvider};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::claims::AccessTokenClaims;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::signer::{TokenSigner, TokenVerifier};

/// Token endpoint response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed access token.
    pub access_token: String,

    /// Always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Refresh token, when the grant issues one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Token issuance, rotation and revocation service.
pub struct TokenService {
    tokens: Arc<dyn TokenProvider>,
    codes: Arc<dyn CodeProvider>,
    signer: Arc<TokenSigner>,
    verifier: Arc<TokenVerifier>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        codes: Arc<dyn CodeProvider>,
        signer: Arc<TokenSigner>,
        verifier: Arc<TokenVerifier>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            tokens,
            codes,
            signer,
            verifier,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Redeems an authorization code for a token pair.
    ///
    /// Validation order: existence, replay, expiry, client binding,
    /// redirect binding, PKCE, then the atomic one-shot transition. A code
    /// observed `used`, before or at the conditional update, triggers
    /// revocation of every token minted from its first redemption.
    pub async fn exchange_code(
        &self,
        client: &OAuth2Client,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> OAuth2Result<TokenResponse> {
        if !client.allows_grant_type(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client may not use the authorization code grant".to_string(),
            ));
        }

        let record = self
            .codes
            .get_by_code(code)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidGrant("authorization code not found".to_string()))?;

        if record.used {
            // Replay: burn everything the first redemption produced.
            let revoked = self.tokens.revoke_by_auth_code(record.id).await?;
            if revoked > 0 {
                tracing::warn!(
                    client_id = %record.client_id,
                    revoked,
                    "authorization code replay detected; derived tokens revoked"
                );
            }
            return Err(OAuth2Error::InvalidGrant(
                "authorization code has already been used".to_string(),
            ));
        }

        if record.is_expired(Utc::now()) {
            return Err(OAuth2Error::InvalidGrant(
                "authorization code has expired".to_string(),
            ));
        }

        if record.client_id != client.client_id {
            return Err(OAuth2Error::InvalidGrant(
                "authorization code was issued to a different client".to_string(),
            ));
        }

        if record.redirect_uri != redirect_uri {
            return Err(OAuth2Error::InvalidGrant(
                "redirect_uri does not match the authorization request".to_string(),
            ));
        }

        if let Some(challenge) = record.code_challenge.as_deref().filter(|c| !c.is_empty()) {
            let verifier = code_verifier.ok_or_else(|| {
                OAuth2Error::InvalidGrant("code_verifier is required".to_string())
            })?;

            let method = record
                .code_challenge_method
                .unwrap_or(CodeChallengeMethod::S256);

            if !verify_code_challenge(verifier, challenge, method) {
                return Err(OAuth2Error::InvalidGrant(
                    "code_verifier does not match the challenge".to_string(),
                ));
            }
        }

        if !self.codes.redeem(code).await? {
            // A concurrent redemption won the conditional update.
            self.tokens.revoke_by_auth_code(record.id).await?;
            return Err(OAuth2Error::InvalidGrant(
                "authorization code has already been used".to_string(),
            ));
        }

        let (access_token, access_record) = self
            .mint_access_token(
                &client.client_id,
                Some(record.user_id),
                &record.scopes,
                Some(record.id),
            )
            .await?;

        let refresh_token = self
            .mint_refresh_token(
                &client.client_id,
                record.user_id,
                &record.scopes,
                Some(access_record.id),
                Some(record.id),
            )
            .await?;

        Ok(self.response(access_token, Some(refresh_token), &record.scopes))
    }

    /// Rotates a refresh token into a fresh pair.
    ///
    /// The new pair is persisted before the presented token is revoked: a
    /// crash in between leaves two usable tokens briefly, the opposite
    /// order could leave the user with none.
    pub async fn refresh(
        &self,
        client: &OAuth2Client,
        refresh_token: &str,
    ) -> OAuth2Result<TokenResponse> {
        if !client.allows_grant_type(GrantType::RefreshToken) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client may not use the refresh token grant".to_string(),
            ));
        }

        let presented_hash = sha256_hex(refresh_token.as_bytes());

        let record = self
            .tokens
            .get_refresh_token_by_hash(&presented_hash)
            .await?
            .ok_or_else(|| OAuth2Error::InvalidGrant("refresh token not found".to_string()))?;

        if record.revoked {
            return Err(OAuth2Error::InvalidGrant(
                "refresh token has been revoked".to_string(),
            ));
        }

        if record.is_expired(Utc::now()) {
            return Err(OAuth2Error::InvalidGrant(
                "refresh token has expired".to_string(),
            ));
        }

        if record.client_id != client.client_id {
            return Err(OAuth2Error::InvalidGrant(
                "refresh token was issued to a different client".to_string(),
            ));
        }

        let (access_token, access_record) = self
            .mint_access_token(
                &client.client_id,
                Some(record.user_id),
                &record.scopes,
                record.auth_code_id,
            )
            .await?;

        let new_refresh_token = self
            .mint_refresh_token(
                &client.client_id,
                record.user_id,
                &record.scopes,
                Some(access_record.id),
                record.auth_code_id,
            )
            .await?;

        // Only after the new pair exists.
        self.tokens
            .revoke_refresh_token_by_hash(&presented_hash)
            .await?;

        Ok(self.response(access_token, Some(new_refresh_token), &record.scopes))
    }

    /// Client credentials grant: an access token for the client itself.
    ///
    /// No subject, no refresh token.
    pub async fn client_credentials(
        &self,
        client: &OAuth2Client,
        scopes: Vec<String>,
    ) -> OAuth2Result<TokenResponse> {
        if !client.allows_grant_type(GrantType::ClientCredentials) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client may not use the client credentials grant".to_string(),
            ));
        }

        if !client.allows_scopes(&scopes) {
            return Err(OAuth2Error::InvalidScope(
                "requested scopes exceed the client's allowed set".to_string(),
            ));
        }

        let (access_token, _) = self
            .mint_access_token(&client.client_id, None, &scopes, None)
            .await?;

        Ok(self.response(access_token, None, &scopes))
    }

    /// Revocation endpoint semantics: best effort, never an error.
    ///
    /// The response must not reveal whether the token existed.
    pub async fn revoke(&self, token: &str, token_type_hint: Option<&str>) -> OAuth2Result<()> {
        let hash = sha256_hex(token.as_bytes());

        if token_type_hint == Some("refresh_token") {
            self.tokens.revoke_refresh_token_by_hash(&hash).await?;
            return Ok(());
        }

        // Default to the access-token interpretation; fall through to the
        // refresh store so a missing hint still revokes.
        if !self.tokens.delete_access_token_by_hash(&hash).await? {
            self.tokens.revoke_refresh_token_by_hash(&hash).await?;
        }

        Ok(())
    }

    /// Validates a bearer token for resource access.
    ///
    /// Signature, issuer, expiry and not-before come from the JWT; the
    /// SHA-256 presence check against the store adds revocation authority
    /// over tokens the signature alone would still accept.
    pub async fn validate_bearer(
        &self,
        token: &str,
    ) -> OAuth2Result<(AccessTokenClaims, AccessTokenRecord)> {
        let claims = self.verifier.verify(token)?;

        let hash = sha256_hex(token.as_bytes());
        let record = self
            .tokens
            .get_access_token_by_hash(&hash)
            .await?
            .ok_or_else(|| {
                OAuth2Error::InvalidToken("token is unknown or has been revoked".to_string())
            })?;

        Ok((claims, record))
    }

    /// Background sweep of expired token records.
    pub async fn purge_expired(&self) -> OAuth2Result<u64> {
        Ok(self.tokens.delete_expired(Utc::now()).await?)
    }

    async fn mint_access_token(
        &self,
        client_id: &str,
        user_id: Option<Uuid>,
        scopes: &[String],
        auth_code_id: Option<Uuid>,
    ) -> OAuth2Result<(String, AccessTokenRecord)> {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.access_ttl)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let record_id = Uuid::now_v7();
        let claims = AccessTokenClaims::new(
            self.signer.issuer(),
            user_id.map(|id| id.to_string()),
            client_id,
            scopes.join(" "),
            now,
            expires_at,
            record_id.to_string(),
        );

        let access_token = self.signer.sign(&claims)?;

        let record = AccessTokenRecord {
            id: record_id,
            token_hash: sha256_hex(access_token.as_bytes()),
            client_id: client_id.to_string(),
            user_id,
            scopes: scopes.to_vec(),
            auth_code_id,
            expires_at,
            created_at: now,
        };

        self.tokens.create_access_token(&record).await?;

        Ok((access_token, record))
    }

    async fn mint_refresh_token(
        &self,
        client_id: &str,
        user_id: Uuid,
        scopes: &[String],
        access_token_id: Option<Uuid>,
        auth_code_id: Option<Uuid>,
    ) -> OAuth2Result<String> {
        let token = generate_refresh_token();
        let now = Utc::now();

        let record = RefreshTokenRecord {
            id: Uuid::now_v7(),
            token_hash: sha256_hex(token.as_bytes()),
            access_token_id,
            auth_code_id,
            client_id: client_id.to_string(),
            user_id,
            scopes: scopes.to_vec(),
            expires_at: now
                + chrono::Duration::from_std(self.refresh_ttl)
                    .unwrap_or_else(|_| chrono::Duration::days(30)),
            revoked: false,
            created_at: now,
        };

        self.tokens.create_refresh_token(&record).await?;

        Ok(token)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn response(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        scopes: &[String],
    ) -> TokenResponse {
        TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.as_secs() as i64,
            refresh_token,
            scope: if scopes.is_empty() {
                None
            } else {
                Some(scopes.join(" "))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AuthorizationService;
    use crate::client::{ClientRegistration, ClientRegistry};
    use janus_crypto::pkce::code_challenge_s256;
    use janus_crypto::{PasswordHasher, RsaKeyMaterial};
    use janus_test_support::{
        MemoryClientProvider, MemoryCodeProvider, MemoryConsentProvider, MemoryScopeProvider,
        MemoryTokenProvider,
    };
    use std::sync::LazyLock;

    const ISSUER: &str = "http://localhost:8080";
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    // RSA generation is expensive; every test shares one process key, which
    // is exactly the production shape.
    static KEY: LazyLock<RsaKeyMaterial> = LazyLock::new(|| RsaKeyMaterial::generate().unwrap());

    struct Harness {
        service: TokenService,
        authz: AuthorizationService,
        tokens: Arc<MemoryTokenProvider>,
        client: OAuth2Client,
        user_id: Uuid,
    }

    async fn harness() -> Harness {
        let tokens = MemoryTokenProvider::new();
        let codes = MemoryCodeProvider::new();

        let registry = Arc::new(ClientRegistry::new(
            MemoryClientProvider::new(),
            MemoryScopeProvider::with_scopes(&["openid", "profile"]),
            Arc::new(PasswordHasher::with_defaults()),
        ));

        let (client, _) = registry
            .register(ClientRegistration {
                name: "Test App".to_string(),
                description: String::new(),
                redirect_uris: vec!["http://app/cb".to_string()],
                allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
                grant_types: vec![
                    "authorization_code".to_string(),
                    "refresh_token".to_string(),
                    "client_credentials".to_string(),
                ],
                is_public: true,
                owner_user_id: None,
            })
            .await
            .unwrap();

        let signer = Arc::new(TokenSigner::from_key_material(&KEY, ISSUER).unwrap());
        let verifier = Arc::new(TokenVerifier::from_key_material(&[&*KEY], ISSUER).unwrap());

        let service = TokenService::new(
            tokens.clone(),
            codes.clone(),
            signer,
            verifier,
            Duration::from_secs(3600),
            Duration::from_secs(86_400),
        );

        let authz = AuthorizationService::new(
            codes,
            MemoryConsentProvider::new(),
            registry,
            Duration::from_secs(600),
            true,
        );

        Harness {
            service,
            authz,
            tokens,
            client,
            user_id: Uuid::now_v7(),
        }
    }

    fn scopes() -> Vec<String> {
        vec!["openid".to_string(), "profile".to_string()]
    }

    async fn issue_code(h: &Harness) -> String {
        h.authz
            .create_authorization_code(
                &h.client.client_id,
                h.user_id,
                "http://app/cb",
                scopes(),
                Some(code_challenge_s256(VERIFIER)),
                Some("S256".to_string()),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn pkce_code_flow_round_trips() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let response = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.scope.as_deref(), Some("openid profile"));
        assert!(response.refresh_token.is_some());

        // The access token verifies and introspects
        let (claims, record) = h
            .service
            .validate_bearer(&response.access_token)
            .await
            .unwrap();
        assert_eq!(claims.sub, Some(h.user_id.to_string()));
        assert_eq!(record.user_id, Some(h.user_id));
    }

    #[tokio::test]
    async fn second_redemption_fails_and_revokes_the_first() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let first = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();

        let err = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));

        // Replay defense: the first redemption's tokens are dead
        assert!(h.service.validate_bearer(&first.access_token).await.is_err());
        let err = h
            .service
            .refresh(&h.client, first.refresh_token.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn wrong_verifier_and_missing_verifier_are_refused() {
        let h = harness().await;

        let code = issue_code(&h).await;
        let err = h
            .service
            .exchange_code(
                &h.client,
                &code,
                "http://app/cb",
                Some("wrong-verifier-wrong-verifier-wrong-verif43"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));

        let err = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", None)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));

        // The failed PKCE checks must not consume the code
        let response = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();
        assert!(!response.access_token.is_empty());
    }

    #[tokio::test]
    async fn redirect_uri_binding_is_enforced() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let err = h
            .service
            .exchange_code(&h.client, &code, "http://evil/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn client_binding_is_enforced() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let mut other = h.client.clone();
        other.client_id = "someone-else".to_string();

        let err = h
            .service
            .exchange_code(&other, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn refresh_rotation_retires_the_presented_token() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let first = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();
        let old_refresh = first.refresh_token.unwrap();

        let second = h.service.refresh(&h.client, &old_refresh).await.unwrap();
        let new_refresh = second.refresh_token.clone().unwrap();

        assert_ne!(second.access_token, first.access_token);
        assert_ne!(new_refresh, old_refresh);

        // The old token is terminal
        let err = h.service.refresh(&h.client, &old_refresh).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));

        // The new one works
        h.service.refresh(&h.client, &new_refresh).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_rejects_foreign_clients() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let response = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();

        let mut other = h.client.clone();
        other.client_id = "someone-else".to_string();

        let err = h
            .service
            .refresh(&other, response.refresh_token.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn client_credentials_has_no_subject_and_no_refresh() {
        let h = harness().await;

        let response = h
            .service
            .client_credentials(&h.client, vec!["openid".to_string()])
            .await
            .unwrap();

        assert!(response.refresh_token.is_none());

        let (claims, record) = h
            .service
            .validate_bearer(&response.access_token)
            .await
            .unwrap();
        assert!(claims.sub.is_none());
        assert!(record.user_id.is_none());
    }

    #[tokio::test]
    async fn client_credentials_scope_check() {
        let h = harness().await;

        let err = h
            .service
            .client_credentials(&h.client, vec!["admin".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidScope(_)));
    }

    #[tokio::test]
    async fn revocation_kills_userinfo_and_refresh() {
        let h = harness().await;
        let code = issue_code(&h).await;

        let response = h
            .service
            .exchange_code(&h.client, &code, "http://app/cb", Some(VERIFIER))
            .await
            .unwrap();

        // Revoke the access token
        h.service.revoke(&response.access_token, None).await.unwrap();
        assert!(
            h.service
                .validate_bearer(&response.access_token)
                .await
                .is_err()
        );

        // Revoke the refresh token via the hint path
        let refresh = response.refresh_token.unwrap();
        h.service
            .revoke(&refresh, Some("refresh_token"))
            .await
            .unwrap();
        let err = h.service.refresh(&h.client, &refresh).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    }

    #[tokio::test]
    async fn revoking_unknown_tokens_is_silent() {
        let h = harness().await;

        h.service.revoke("no-such-token", None).await.unwrap();
        h.service
            .revoke("no-such-token", Some("refresh_token"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn grant_type_gate_is_enforced() {
        let h = harness().await;

        let mut limited = h.client.clone();
        limited.grant_types = vec![GrantType::AuthorizationCode];

        let err = h
            .service
            .client_credentials(&limited, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::UnauthorizedClient(_)));

        let err = h.service.refresh(&limited, "whatever").await.unwrap_err();
        assert!(matches!(err, OAuth2Error::UnauthorizedClient(_)));
    }

    #[tokio::test]
    async fn forged_token_fails_before_the_store_is_consulted() {
        let h = harness().await;

        assert!(h.service.validate_bearer("not.a.jwt").await.is_err());
        assert_eq!(h.tokens.live_refresh_count(), 0);
    }
}
