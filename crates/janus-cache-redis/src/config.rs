//! Redis connection configuration.

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL (`redis://…` or `rediss://…`).
    pub url: String,
    /// Key prefix for every key this store writes.
    pub key_prefix: String,
    /// TTL for per-user session sets, in seconds.
    ///
    /// The set is an index, not the source of truth; it is refreshed on
    /// every session creation and lazily repaired on reads, so a generous
    /// bound is enough.
    pub user_set_ttl_secs: i64,
}

impl RedisConfig {
    /// Creates a configuration for the given URL with defaults.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: "janus".to_string(),
            user_set_ttl_secs: 7 * 24 * 3600,
        }
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Formats a key with the configured prefix.
    #[must_use]
    pub fn prefixed_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_key() {
        let config = RedisConfig::new("redis://localhost:6379");
        assert_eq!(config.prefixed_key("session:abc"), "janus:session:abc");

        let config = config.key_prefix("");
        assert_eq!(config.prefixed_key("session:abc"), "session:abc");
    }
}
