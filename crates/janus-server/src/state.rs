//! Application state.
//!
//! One `Arc`'d bundle of services, cloned into every handler.

use std::sync::Arc;

use janus_auth::{Authenticator, AuditLogger, PasswordManager, SessionService, TotpManager};
use janus_core::ServerConfig;
use janus_oauth2::{AuthorizationService, ClientRegistry, TokenService, TokenSigner};
use janus_storage::UserProvider;

use crate::mailer::Mailer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    users: Arc<dyn UserProvider>,
    sessions: Arc<SessionService>,
    authenticator: Arc<Authenticator>,
    totp: Arc<TotpManager>,
    passwords: Arc<PasswordManager>,
    clients: Arc<ClientRegistry>,
    authorization: Arc<AuthorizationService>,
    tokens: Arc<TokenService>,
    signer: Arc<TokenSigner>,
    audit: AuditLogger,
    mailer: Arc<dyn Mailer>,
    jwks: serde_json::Value,
}

impl AppState {
    /// Assembles the application state.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        config: ServerConfig,
        users: Arc<dyn UserProvider>,
        sessions: Arc<SessionService>,
        authenticator: Arc<Authenticator>,
        totp: Arc<TotpManager>,
        passwords: Arc<PasswordManager>,
        clients: Arc<ClientRegistry>,
        authorization: Arc<AuthorizationService>,
        tokens: Arc<TokenService>,
        signer: Arc<TokenSigner>,
        audit: AuditLogger,
        mailer: Arc<dyn Mailer>,
        jwks: serde_json::Value,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                users,
                sessions,
                authenticator,
                totp,
                passwords,
                clients,
                authorization,
                tokens,
                signer,
                audit,
                mailer,
                jwks,
            }),
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// User storage.
    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserProvider> {
        &self.inner.users
    }

    /// Session service.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionService> {
        &self.inner.sessions
    }

    /// Login automaton.
    #[must_use]
    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.inner.authenticator
    }

    /// Two-factor manager.
    #[must_use]
    pub fn totp(&self) -> &Arc<TotpManager> {
        &self.inner.totp
    }

    /// Password lifecycle manager.
    #[must_use]
    pub fn passwords(&self) -> &Arc<PasswordManager> {
        &self.inner.passwords
    }

    /// OAuth2 client registry.
    #[must_use]
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.inner.clients
    }

    /// Authorization endpoint service.
    #[must_use]
    pub fn authorization(&self) -> &Arc<AuthorizationService> {
        &self.inner.authorization
    }

    /// Token endpoint service.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.inner.tokens
    }

    /// Process token signer (first-party assertions).
    #[must_use]
    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.inner.signer
    }

    /// Audit logger.
    #[must_use]
    pub fn audit(&self) -> &AuditLogger {
        &self.inner.audit
    }

    /// Outbound mail sink.
    #[must_use]
    pub fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.inner.mailer
    }

    /// The JWK Set of the process public key.
    #[must_use]
    pub fn jwks(&self) -> &serde_json::Value {
        &self.inner.jwks
    }
}
