//! # janus server
//!
//! Entry point: configuration, storage wiring, key generation and the HTTP
//! listener.

#![forbid(unsafe_code)]
#![deny(warnings)]

use std::net::SocketAddr;
use std::sync::Arc;

use janus_auth::{AuditLogger, Authenticator, PasswordManager, SessionService, TotpManager};
use janus_cache_redis::{RedisConfig, RedisSessionStore};
use janus_core::ServerConfig;
use janus_crypto::{PasswordHasher, PasswordPolicy, RsaKeyMaterial};
use janus_oauth2::{
    AuthorizationService, ClientRegistry, TokenService, TokenSigner, TokenVerifier,
};
use janus_server::mailer::LogMailer;
use janus_server::maintenance;
use janus_server::{AppState, create_router};
use janus_storage::SessionStore;
use janus_storage_sql::{
    PgAuditStore, PgClientProvider, PgCodeProvider, PgConsentProvider,
    PgPasswordHistoryProvider, PgResetTicketProvider, PgScopeProvider, PgSessionStore,
    PgTokenProvider, PgUserProvider, PoolConfig, create_pool,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!(base_url = %config.base_url, "janus starting");

    // Store-unavailable at startup is fatal.
    let pool = create_pool(
        &PoolConfig::new(&config.database_url)
            .max_connections(config.db_max_connections)
            .min_connections(config.db_min_connections),
    )
    .await
    .map_err(|e| anyhow::anyhow!("database connection failed: {e}"))?;

    // So is a signing key failure.
    let key_material = RsaKeyMaterial::generate()
        .map_err(|e| anyhow::anyhow!("signing key generation failed: {e}"))?;
    tracing::info!(kid = key_material.key_id(), "signing key generated");

    // Session backend: Redis when configured, Postgres otherwise.
    let session_store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect(RedisConfig::new(url))
                .await
                .map_err(|e| anyhow::anyhow!("redis connection failed: {e}"))?;
            tracing::info!("session store: redis");
            Arc::new(store)
        }
        None => {
            tracing::info!("session store: postgres");
            Arc::new(PgSessionStore::new(pool.clone()))
        }
    };

    let users = Arc::new(PgUserProvider::new(pool.clone()));
    let history = Arc::new(PgPasswordHistoryProvider::new(pool.clone()));
    let tickets = Arc::new(PgResetTicketProvider::new(pool.clone()));
    let clients_store = Arc::new(PgClientProvider::new(pool.clone()));
    let codes = Arc::new(PgCodeProvider::new(pool.clone()));
    let tokens_store = Arc::new(PgTokenProvider::new(pool.clone()));
    let consents = Arc::new(PgConsentProvider::new(pool.clone()));
    let scopes = Arc::new(PgScopeProvider::new(pool.clone()));
    let audit_store = Arc::new(PgAuditStore::new(pool));

    let hasher = Arc::new(PasswordHasher::with_defaults());
    let audit = AuditLogger::new(audit_store);

    let sessions = Arc::new(SessionService::new(
        session_store.clone(),
        config.session_duration(),
    ));

    let totp = Arc::new(TotpManager::new(
        users.clone(),
        hasher.clone(),
        config.base_url.clone(),
    ));

    let authenticator = Arc::new(Authenticator::new(
        users.clone(),
        sessions.clone(),
        totp.clone(),
        hasher.clone(),
        audit.clone(),
        config.max_login_attempts,
        config.lockout_duration(),
    ));

    let policy = PasswordPolicy {
        min_length: config.password_min_length,
        require_uppercase: config.password_require_uppercase,
        require_lowercase: config.password_require_lowercase,
        require_number: config.password_require_number,
        require_special: config.password_require_special,
        deny_common: true,
    };

    let passwords = Arc::new(PasswordManager::new(
        users.clone(),
        history,
        tickets,
        session_store,
        hasher.clone(),
        audit.clone(),
        policy,
        config.password_history_count,
        config.reset_token_duration(),
    ));

    let signer = Arc::new(
        TokenSigner::from_key_material(&key_material, &config.base_url)
            .map_err(|e| anyhow::anyhow!("signer construction failed: {e}"))?,
    );
    let verifier = Arc::new(
        TokenVerifier::from_key_material(&[&key_material], &config.base_url)
            .map_err(|e| anyhow::anyhow!("verifier construction failed: {e}"))?,
    );

    let client_registry = Arc::new(ClientRegistry::new(clients_store, scopes, hasher));

    let authorization = Arc::new(AuthorizationService::new(
        codes.clone(),
        consents,
        client_registry.clone(),
        config.auth_code_duration(),
        config.oauth2_enforce_pkce,
    ));

    let token_service = Arc::new(TokenService::new(
        tokens_store,
        codes,
        signer.clone(),
        verifier,
        config.access_token_duration(),
        config.refresh_token_duration(),
    ));

    let jwks = json!({ "keys": [key_material.public_key_jwk()] });

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = AppState::new(
        config,
        users,
        sessions,
        authenticator,
        totp,
        passwords,
        client_registry,
        authorization,
        token_service,
        signer,
        audit,
        Arc::new(LogMailer),
        jwks,
    );

    maintenance::spawn_sweeps(state.clone());

    let router = create_router(state);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
