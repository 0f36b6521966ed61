//! Database connection pool management.
//!
//! The pool is the shared resource every request funnels through: it
//! enforces the max-in-use cap, and a caller that cannot get a connection
//! blocks until the acquire deadline fires. That deadline is deliberately
//! shorter than the HTTP request timeout so saturation surfaces as a
//! storage error instead of a silent request timeout. Password hashing is
//! CPU-bound and happens before any connection is taken, so the pool is
//! sized for concurrent requests, not for hash latency.

use std::time::Duration;

use janus_storage::StorageError;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Upper bound on waiting for a free connection.
///
/// Kept under the server's 30-second request deadline.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Database pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Database connection URL.
    pub url: String,
    /// Max-in-use connection cap.
    pub max_connections: u32,
    /// Connections kept warm between bursts.
    pub min_connections: u32,
    /// How long a saturated caller blocks before giving up.
    pub acquire_timeout: Duration,
    /// Idle time before a warm connection is closed.
    pub idle_timeout: Duration,
    /// Maximum connection lifetime, bounding server-side state drift.
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/janus".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl PoolConfig {
    /// Creates a pool configuration for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the max-in-use connection cap.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the number of connections kept warm.
    #[must_use]
    pub const fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire deadline.
    ///
    /// Should stay below the request timeout; a longer value just converts
    /// pool saturation into client-visible request timeouts.
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the maximum connection lifetime.
    #[must_use]
    pub const fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

/// Connects a `PostgreSQL` pool with the configured limits.
///
/// # Errors
///
/// Returns a connection error; at startup callers treat this as fatal.
pub async fn create_pool(config: &PoolConfig) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect(&config.url)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_deadline_stays_below_request_deadline() {
        let config = PoolConfig::default();
        // The HTTP layer aborts requests at 30 seconds; waiting longer than
        // that for a connection would never be observed.
        assert!(config.acquire_timeout < Duration::from_secs(30));
    }

    #[test]
    fn builder_overrides_every_limit() {
        let config = PoolConfig::new("postgres://localhost/janus_test")
            .max_connections(32)
            .min_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(60))
            .max_lifetime(Duration::from_secs(600));

        assert_eq!(config.url, "postgres://localhost/janus_test");
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.max_lifetime, Duration::from_secs(600));
    }

    #[test]
    fn warm_pool_is_a_subset_of_the_cap() {
        let config = PoolConfig::default();
        assert!(config.min_connections <= config.max_connections);
    }
}
