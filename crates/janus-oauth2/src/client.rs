//! OAuth2 client registry.
//!
//! Registration mints the wire credentials: a 128-bit client id and, for
//! confidential clients, a 256-bit secret that is returned exactly once and
//! stored as a password hash.

use std::sync::Arc;

use chrono::Utc;
use janus_crypto::random::{generate_client_id, generate_client_secret};
use janus_crypto::{PasswordHashError, PasswordHasher};
use janus_model::{GrantType, OAuth2Client};
use janus_storage::{ClientProvider, ScopeProvider};
use uuid::Uuid;

use crate::error::{OAuth2Error, OAuth2Result};

/// A client registration request.
pub struct ClientRegistration {
    /// Human-readable name.
    pub name: String,
    /// Description for the consent prompt.
    pub description: String,
    /// Exact-match redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Scopes the client may request; each must exist in the registry.
    pub allowed_scopes: Vec<String>,
    /// Requested grant types.
    pub grant_types: Vec<String>,
    /// Whether the client is public (no secret, PKCE required).
    pub is_public: bool,
    /// Owning principal, if any.
    pub owner_user_id: Option<Uuid>,
}

/// Client registry service.
pub struct ClientRegistry {
    clients: Arc<dyn ClientProvider>,
    scopes: Arc<dyn ScopeProvider>,
    hasher: Arc<PasswordHasher>,
}

impl ClientRegistry {
    /// Creates a registry.
    #[must_use]
    pub fn new(
        clients: Arc<dyn ClientProvider>,
        scopes: Arc<dyn ScopeProvider>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            clients,
            scopes,
            hasher,
        }
    }

    /// Registers a client.
    ///
    /// Returns the stored client and, for confidential clients, the plain
    /// secret: the only time it is ever available.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for unknown grant types, `InvalidScope` when a
    /// requested scope does not exist.
    pub async fn register(
        &self,
        registration: ClientRegistration,
    ) -> OAuth2Result<(OAuth2Client, Option<String>)> {
        let mut grant_types = Vec::with_capacity(registration.grant_types.len());
        for raw in &registration.grant_types {
            let grant_type = GrantType::parse(raw)
                .ok_or_else(|| OAuth2Error::InvalidRequest(format!("invalid grant type: {raw}")))?;
            grant_types.push(grant_type);
        }

        if !self.scopes.all_exist(&registration.allowed_scopes).await? {
            return Err(OAuth2Error::InvalidScope(
                "one or more scopes do not exist".to_string(),
            ));
        }

        let client_id = generate_client_id();

        let (secret, secret_hash) = if registration.is_public {
            (None, None)
        } else {
            let secret = generate_client_secret();
            let hash = self
                .hasher
                .hash(&secret)
                .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
            (Some(secret), Some(hash))
        };

        let now = Utc::now();
        let client = OAuth2Client {
            id: Uuid::now_v7(),
            client_id,
            client_secret_hash: secret_hash,
            name: registration.name,
            description: registration.description,
            redirect_uris: registration.redirect_uris,
            allowed_scopes: registration.allowed_scopes,
            grant_types,
            is_public: registration.is_public,
            is_active: true,
            owner_user_id: registration.owner_user_id,
            created_at: now,
            updated_at: now,
        };

        self.clients.create(&client).await?;

        Ok((client, secret))
    }

    /// Validates client credentials.
    ///
    /// Public clients authenticate by id alone. Confidential clients must
    /// present a secret matching the stored hash. Inactive clients always
    /// fail.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` for every failure mode; the message does not
    /// distinguish unknown id from bad secret.
    pub async fn validate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> OAuth2Result<OAuth2Client> {
        let client = self
            .clients
            .get_by_client_id(client_id)
            .await?
            .ok_or_else(invalid_client)?;

        if !client.is_active {
            return Err(OAuth2Error::InvalidClient("client is not active".to_string()));
        }

        if client.is_public {
            return Ok(client);
        }

        let secret = client_secret.ok_or_else(invalid_client)?;
        let hash = client
            .client_secret_hash
            .as_deref()
            .ok_or_else(invalid_client)?;

        match self.hasher.verify(secret, hash) {
            Ok(()) => Ok(client),
            Err(PasswordHashError::Mismatch | PasswordHashError::Malformed) => {
                Err(invalid_client())
            }
            Err(err) => Err(OAuth2Error::ServerError(err.to_string())),
        }
    }

    /// Loads an active client without credential validation.
    ///
    /// For browser-facing paths (authorization endpoint, consent prompt)
    /// where no client secret is in play.
    pub async fn get_active(&self, client_id: &str) -> OAuth2Result<OAuth2Client> {
        let client = self
            .clients
            .get_by_client_id(client_id)
            .await?
            .ok_or_else(invalid_client)?;

        if !client.is_active {
            return Err(OAuth2Error::InvalidClient("client is not active".to_string()));
        }

        Ok(client)
    }

    /// Checks a redirect URI against the client's registered set.
    ///
    /// Exact string match; no prefixes, no normalization.
    pub async fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> OAuth2Result<bool> {
        let Some(client) = self.clients.get_by_client_id(client_id).await? else {
            return Ok(false);
        };

        Ok(client.is_active && client.allows_redirect_uri(uri))
    }

    /// Checks requested scopes against the client's allowed set.
    pub async fn validate_scopes(&self, client_id: &str, scopes: &[String]) -> OAuth2Result<bool> {
        let Some(client) = self.clients.get_by_client_id(client_id).await? else {
            return Ok(false);
        };

        Ok(client.allows_scopes(scopes))
    }

    /// Soft-revokes a client; subsequent token operations reject it.
    pub async fn revoke(&self, client_id: &str) -> OAuth2Result<()> {
        self.clients.deactivate(client_id).await?;
        Ok(())
    }
}

fn invalid_client() -> OAuth2Error {
    OAuth2Error::InvalidClient("invalid client credentials".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_test_support::{MemoryClientProvider, MemoryScopeProvider};

    fn registry() -> ClientRegistry {
        ClientRegistry::new(
            MemoryClientProvider::new(),
            MemoryScopeProvider::with_scopes(&["openid", "profile", "email"]),
            Arc::new(PasswordHasher::with_defaults()),
        )
    }

    fn registration(is_public: bool) -> ClientRegistration {
        ClientRegistration {
            name: "Test App".to_string(),
            description: String::new(),
            redirect_uris: vec!["http://app/cb".to_string()],
            allowed_scopes: vec!["openid".to_string(), "profile".to_string()],
            grant_types: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            is_public,
            owner_user_id: None,
        }
    }

    #[tokio::test]
    async fn public_client_has_no_secret() {
        let registry = registry();

        let (client, secret) = registry.register(registration(true)).await.unwrap();

        assert!(client.is_public);
        assert!(secret.is_none());
        assert!(client.client_secret_hash.is_none());
        // 128-bit id, base64url
        assert_eq!(client.client_id.len(), 22);

        // Validates by id alone
        registry.validate(&client.client_id, None).await.unwrap();
    }

    #[tokio::test]
    async fn confidential_client_secret_is_returned_once_and_hashed() {
        let registry = registry();

        let (client, secret) = registry.register(registration(false)).await.unwrap();
        let secret = secret.expect("confidential clients get a secret");

        // 256-bit secret, base64url
        assert_eq!(secret.len(), 43);
        // Stored as a hash, not the secret itself
        let hash = client.client_secret_hash.as_deref().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, secret);

        registry
            .validate(&client.client_id, Some(&secret))
            .await
            .unwrap();

        let err = registry
            .validate(&client.client_id, Some("wrong-secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));

        let err = registry.validate(&client.client_id, None).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));
    }

    #[tokio::test]
    async fn unknown_grant_type_is_rejected() {
        let registry = registry();

        let mut reg = registration(true);
        reg.grant_types = vec!["implicit".to_string()];

        let err = registry.register(reg).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn unknown_scope_is_rejected() {
        let registry = registry();

        let mut reg = registration(true);
        reg.allowed_scopes = vec!["openid".to_string(), "admin".to_string()];

        let err = registry.register(reg).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidScope(_)));
    }

    #[tokio::test]
    async fn redirect_uri_validation_is_exact() {
        let registry = registry();
        let (client, _) = registry.register(registration(true)).await.unwrap();

        assert!(
            registry
                .validate_redirect_uri(&client.client_id, "http://app/cb")
                .await
                .unwrap()
        );
        assert!(
            !registry
                .validate_redirect_uri(&client.client_id, "http://app/cb/extra")
                .await
                .unwrap()
        );
        assert!(
            !registry
                .validate_redirect_uri("unknown-client", "http://app/cb")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn revoked_client_fails_validation() {
        let registry = registry();
        let (client, _) = registry.register(registration(true)).await.unwrap();

        registry.revoke(&client.client_id).await.unwrap();

        let err = registry.validate(&client.client_id, None).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidClient(_)));
        assert!(
            !registry
                .validate_redirect_uri(&client.client_id, "http://app/cb")
                .await
                .unwrap()
        );
    }
}
