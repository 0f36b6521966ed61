//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use std::time::Duration;

/// Lifetime of a temporary two-factor session, in seconds.
///
/// A principal whose password checked out but who still owes a TOTP code
/// holds one of these. Deliberately not configurable.
pub const TEMP_SESSION_TTL_SECS: u64 = 300;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// Base URL for the server (issuer for signed tokens, links in mail).
    pub base_url: String,

    /// Database connection URL.
    pub database_url: String,

    /// Minimum database connections.
    pub db_min_connections: u32,

    /// Maximum database connections.
    pub db_max_connections: u32,

    /// Redis URL. When set, sessions live in Redis instead of Postgres.
    pub redis_url: Option<String>,

    /// Session lifetime in seconds (sliding window).
    pub session_timeout: u64,

    /// Minimum password length.
    pub password_min_length: usize,

    /// Require at least one uppercase letter.
    pub password_require_uppercase: bool,

    /// Require at least one lowercase letter.
    pub password_require_lowercase: bool,

    /// Require at least one digit.
    pub password_require_number: bool,

    /// Require at least one special character.
    pub password_require_special: bool,

    /// How many previous password hashes to keep and reject on reuse.
    pub password_history_count: usize,

    /// Password reset ticket lifetime in seconds.
    pub password_reset_token_expiry: u64,

    /// Failed login attempts before the account locks.
    pub max_login_attempts: i32,

    /// How long a lockout lasts, in seconds.
    pub account_lockout_duration: u64,

    /// Authorization code lifetime in seconds.
    pub oauth2_auth_code_expiry: u64,

    /// Access token lifetime in seconds.
    pub oauth2_access_token_expiry: u64,

    /// Refresh token lifetime in seconds.
    pub oauth2_refresh_token_expiry: u64,

    /// Require PKCE from public clients.
    pub oauth2_enforce_pkce: bool,

    /// Set the Secure attribute on the session cookie.
    pub cookie_secure: bool,

    /// Log level.
    pub log_level: String,
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let host = env_or("JANUS_HOST", "0.0.0.0");
        let port = env_parse("JANUS_PORT", 8080);

        let base_url = std::env::var("SERVER_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"));

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            db_min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 1),
            db_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: std::env::var("REDIS_URL").ok(),
            session_timeout: env_parse("SESSION_TIMEOUT", 86_400),
            password_min_length: env_parse("PASSWORD_MIN_LENGTH", 8),
            password_require_uppercase: env_bool("PASSWORD_REQUIRE_UPPERCASE", true),
            password_require_lowercase: env_bool("PASSWORD_REQUIRE_LOWERCASE", true),
            password_require_number: env_bool("PASSWORD_REQUIRE_NUMBER", true),
            password_require_special: env_bool("PASSWORD_REQUIRE_SPECIAL", true),
            password_history_count: env_parse("PASSWORD_HISTORY_COUNT", 5),
            password_reset_token_expiry: env_parse("PASSWORD_RESET_TOKEN_EXPIRY", 3_600),
            max_login_attempts: env_parse("MAX_LOGIN_ATTEMPTS", 5),
            account_lockout_duration: env_parse("ACCOUNT_LOCKOUT_DURATION", 900),
            oauth2_auth_code_expiry: env_parse("OAUTH2_AUTH_CODE_EXPIRY", 600),
            oauth2_access_token_expiry: env_parse("OAUTH2_ACCESS_TOKEN_EXPIRY", 3_600),
            oauth2_refresh_token_expiry: env_parse("OAUTH2_REFRESH_TOKEN_EXPIRY", 2_592_000),
            oauth2_enforce_pkce: env_bool("OAUTH2_ENFORCE_PKCE", true),
            cookie_secure: env_bool("COOKIE_SECURE", false),
            log_level: env_or("RUST_LOG", "info"),
        })
    }

    /// Creates a configuration for testing.
    #[must_use]
    pub fn for_testing(database_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0, // Random port
            base_url: "http://localhost:8080".to_string(),
            database_url: database_url.to_string(),
            db_min_connections: 1,
            db_max_connections: 5,
            redis_url: None,
            session_timeout: 86_400,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_lowercase: true,
            password_require_number: true,
            password_require_special: true,
            password_history_count: 5,
            password_reset_token_expiry: 3_600,
            max_login_attempts: 5,
            account_lockout_duration: 900,
            oauth2_auth_code_expiry: 600,
            oauth2_access_token_expiry: 3_600,
            oauth2_refresh_token_expiry: 2_592_000,
            oauth2_enforce_pkce: true,
            cookie_secure: false,
            log_level: "debug".to_string(),
        }
    }

    /// Returns the session timeout as a duration.
    #[must_use]
    pub const fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }

    /// Returns the lockout duration.
    #[must_use]
    pub const fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.account_lockout_duration)
    }

    /// Returns the reset ticket lifetime.
    #[must_use]
    pub const fn reset_token_duration(&self) -> Duration {
        Duration::from_secs(self.password_reset_token_expiry)
    }

    /// Returns the authorization code lifetime.
    #[must_use]
    pub const fn auth_code_duration(&self) -> Duration {
        Duration::from_secs(self.oauth2_auth_code_expiry)
    }

    /// Returns the access token lifetime.
    #[must_use]
    pub const fn access_token_duration(&self) -> Duration {
        Duration::from_secs(self.oauth2_access_token_expiry)
    }

    /// Returns the refresh token lifetime.
    #[must_use]
    pub const fn refresh_token_duration(&self) -> Duration {
        Duration::from_secs(self.oauth2_refresh_token_expiry)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::for_testing("postgres://localhost/janus")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_config_defaults() {
        let config = ServerConfig::for_testing("postgres://localhost/test");
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.password_history_count, 5);
        assert!(config.oauth2_enforce_pkce);
        assert_eq!(config.session_duration(), Duration::from_secs(86_400));
    }

    #[test]
    fn durations_match_seconds() {
        let config = ServerConfig::for_testing("postgres://localhost/test");
        assert_eq!(config.lockout_duration(), Duration::from_secs(900));
        assert_eq!(config.auth_code_duration(), Duration::from_secs(600));
        assert_eq!(config.access_token_duration(), Duration::from_secs(3_600));
    }
}
