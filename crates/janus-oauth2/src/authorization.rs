//! Authorization code issuance and the consent ledger.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use janus_crypto::CodeChallengeMethod;
use janus_crypto::random::generate_auth_code;
use janus_model::token::new_authorization_code;
use janus_model::{Consent, GrantType};
use janus_storage::{CodeProvider, ConsentProvider};
use uuid::Uuid;

use crate::client::ClientRegistry;
use crate::error::{OAuth2Error, OAuth2Result};

/// Result of a consent ledger lookup.
pub struct ConsentCheck {
    /// Whether the stored grant covers the entire requested set.
    pub granted: bool,
    /// Requested scopes the stored grant does not cover.
    pub missing_scopes: Vec<String>,
}

/// Authorization endpoint service: consent checks and code issuance.
pub struct AuthorizationService {
    codes: Arc<dyn CodeProvider>,
    consents: Arc<dyn ConsentProvider>,
    clients: Arc<ClientRegistry>,
    code_ttl: Duration,
    enforce_pkce: bool,
}

impl AuthorizationService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        codes: Arc<dyn CodeProvider>,
        consents: Arc<dyn ConsentProvider>,
        clients: Arc<ClientRegistry>,
        code_ttl: Duration,
        enforce_pkce: bool,
    ) -> Self {
        Self {
            codes,
            consents,
            clients,
            code_ttl,
            enforce_pkce,
        }
    }

    /// Consults the consent ledger for (principal, client, scopes).
    pub async fn check_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        requested_scopes: &[String],
    ) -> OAuth2Result<ConsentCheck> {
        match self.consents.get(user_id, client_id).await? {
            Some(consent) => {
                let missing_scopes = consent.missing_scopes(requested_scopes);
                Ok(ConsentCheck {
                    granted: missing_scopes.is_empty(),
                    missing_scopes,
                })
            }
            None => Ok(ConsentCheck {
                granted: false,
                missing_scopes: requested_scopes.to_vec(),
            }),
        }
    }

    /// Records a consent grant.
    ///
    /// Replacement semantics: the stored scope set becomes exactly the
    /// approved one.
    pub async fn grant_consent(
        &self,
        user_id: Uuid,
        client_id: &str,
        scopes: Vec<String>,
    ) -> OAuth2Result<()> {
        let consent = Consent::new(user_id, client_id, scopes);
        self.consents.upsert(&consent).await?;
        Ok(())
    }

    /// Removes a principal's consent for a client.
    pub async fn revoke_consent(&self, user_id: Uuid, client_id: &str) -> OAuth2Result<()> {
        self.consents.revoke(user_id, client_id).await?;
        Ok(())
    }

    /// Issues a one-shot authorization code.
    ///
    /// Validates the client, its redirect URI and scopes, and the PKCE
    /// parameters. A missing challenge method defaults to `S256`; an
    /// unknown one is rejected. Public clients must carry a challenge when
    /// PKCE enforcement is on.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_authorization_code(
        &self,
        client_id: &str,
        user_id: Uuid,
        redirect_uri: &str,
        scopes: Vec<String>,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> OAuth2Result<String> {
        let client = self.clients.get_active(client_id).await?;

        if !client.allows_grant_type(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::UnauthorizedClient(
                "client may not use the authorization code grant".to_string(),
            ));
        }

        if !client.allows_redirect_uri(redirect_uri) {
            return Err(OAuth2Error::InvalidClient(
                "redirect_uri is not registered for this client".to_string(),
            ));
        }

        if !client.allows_scopes(&scopes) {
            return Err(OAuth2Error::InvalidScope(
                "requested scopes exceed the client's allowed set".to_string(),
            ));
        }

        let method = match (&code_challenge, code_challenge_method.as_deref()) {
            (Some(_), None) => Some(CodeChallengeMethod::S256),
            (Some(_), Some(raw)) => Some(
                CodeChallengeMethod::from_str(raw)
                    .map_err(|e| OAuth2Error::InvalidRequest(e.to_string()))?,
            ),
            (None, _) => None,
        };

        if client.is_public && self.enforce_pkce && code_challenge.is_none() {
            return Err(OAuth2Error::InvalidRequest(
                "PKCE is required for public clients".to_string(),
            ));
        }

        let code = generate_auth_code();
        let record = new_authorization_code(
            code.clone(),
            client_id,
            user_id,
            redirect_uri,
            scopes,
            code_challenge,
            method,
            self.code_ttl,
        );

        self.codes.create(&record).await?;

        Ok(code)
    }

    /// Background sweep of expired codes.
    pub async fn purge_expired_codes(&self) -> OAuth2Result<u64> {
        Ok(self.codes.delete_expired(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientRegistration, ClientRegistry};
    use janus_crypto::PasswordHasher;
    use janus_test_support::{
        MemoryClientProvider, MemoryCodeProvider, MemoryConsentProvider, MemoryScopeProvider,
    };

    struct Harness {
        service: AuthorizationService,
        codes: Arc<MemoryCodeProvider>,
        client_id: String,
        user_id: Uuid,
    }

    async fn harness(enforce_pkce: bool, is_public: bool) -> Harness {
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
                grant_types: vec!["authorization_code".to_string()],
                is_public,
                owner_user_id: None,
            })
            .await
            .unwrap();

        let service = AuthorizationService::new(
            codes.clone(),
            MemoryConsentProvider::new(),
            registry,
            Duration::from_secs(600),
            enforce_pkce,
        );

        Harness {
            service,
            codes,
            client_id: client.client_id,
            user_id: Uuid::now_v7(),
        }
    }

    fn scopes() -> Vec<String> {
        vec!["openid".to_string(), "profile".to_string()]
    }

    #[tokio::test]
    async fn consent_starts_absent_and_replacement_overwrites() {
        let h = harness(true, true).await;

        let check = h
            .service
            .check_consent(h.user_id, &h.client_id, &scopes())
            .await
            .unwrap();
        assert!(!check.granted);
        assert_eq!(check.missing_scopes, scopes());

        h.service
            .grant_consent(h.user_id, &h.client_id, scopes())
            .await
            .unwrap();

        let check = h
            .service
            .check_consent(h.user_id, &h.client_id, &scopes())
            .await
            .unwrap();
        assert!(check.granted);

        // Replacement: narrowing the grant drops the old scopes
        h.service
            .grant_consent(h.user_id, &h.client_id, vec!["openid".to_string()])
            .await
            .unwrap();

        let check = h
            .service
            .check_consent(h.user_id, &h.client_id, &scopes())
            .await
            .unwrap();
        assert!(!check.granted);
        assert_eq!(check.missing_scopes, vec!["profile".to_string()]);
    }

    #[tokio::test]
    async fn code_records_the_pkce_binding() {
        let h = harness(true, true).await;

        let code = h
            .service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://app/cb",
                scopes(),
                Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
                None,
            )
            .await
            .unwrap();

        let record = h.codes.get_by_code(&code).await.unwrap().unwrap();
        assert_eq!(record.client_id, h.client_id);
        assert_eq!(record.user_id, h.user_id);
        assert!(!record.used);
        // Method defaults to S256 when omitted
        assert_eq!(record.code_challenge_method, Some(CodeChallengeMethod::S256));
    }

    #[tokio::test]
    async fn public_client_without_challenge_is_refused_when_enforced() {
        let h = harness(true, true).await;

        let err = h
            .service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://app/cb",
                scopes(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn enforcement_off_allows_bare_public_clients() {
        let h = harness(false, true).await;

        h.service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://app/cb",
                scopes(),
                None,
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_challenge_method_is_rejected() {
        let h = harness(true, true).await;

        let err = h
            .service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://app/cb",
                scopes(),
                Some("challenge-value-that-is-long-enough-43chars0".to_string()),
                Some("S512".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unregistered_redirect_uri_is_rejected() {
        let h = harness(false, true).await;

        let err = h
            .service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://evil/cb",
                scopes(),
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));
    }

    #[tokio::test]
    async fn excessive_scopes_are_rejected() {
        let h = harness(false, true).await;

        let err = h
            .service
            .create_authorization_code(
                &h.client_id,
                h.user_id,
                "http://app/cb",
                vec!["admin".to_string()],
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidScope(_)));
    }
}
