//! Password hashing and verification using Argon2id.
//!
//! Also used for OAuth2 client secrets and two-factor backup codes; every
//! secret the server compares a user-supplied string against goes through
//! this hasher.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
    },
};
use thiserror::Error;

/// Errors from hashing or verification.
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// The supplied plaintext does not match the hash.
    #[error("password mismatch")]
    Mismatch,

    /// The stored hash could not be parsed.
    #[error("malformed password hash")]
    Malformed,

    /// Hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        // OWASP recommended settings for Argon2id
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
        }
    }
}

/// Password hasher using Argon2id.
pub struct PasswordHasher {
    params: HashParams,
}

impl PasswordHasher {
    /// Creates a new hasher with the given parameters.
    #[must_use]
    pub const fn new(params: HashParams) -> Self {
        Self { params }
    }

    /// Creates a new hasher with default parameters.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HashParams::default())
    }

    fn build_params(&self) -> Result<Params, PasswordHashError> {
        Params::new(
            self.params.memory_cost,
            self.params.time_cost,
            self.params.parallelism,
            Some(self.params.hash_length as usize),
        )
        .map_err(|e| PasswordHashError::Hashing(e.to_string()))
    }

    /// Hashes a password.
    ///
    /// Returns the PHC-formatted hash string.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, PasswordHashError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.build_params()?);

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordHashError::Hashing(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verifies a password against a hash.
    ///
    /// Comparison time depends only on the hash parameters, not on where the
    /// candidate diverges.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordHashError::Mismatch`] when the password is wrong.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), PasswordHashError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordHashError::Malformed)?;

        // Argon2::default() can verify any Argon2 variant
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| PasswordHashError::Mismatch)
    }

    /// Checks whether a hash was produced with different parameters and
    /// should be recomputed on next successful login.
    #[must_use]
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };

        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return true;
        }

        let params = &parsed.params;
        let m_cost = params.get_decimal("m").unwrap_or(0);
        let t_cost = params.get_decimal("t").unwrap_or(0);
        let p_cost = params.get_decimal("p").unwrap_or(0);

        m_cost != self.params.memory_cost
            || t_cost != self.params.time_cost
            || p_cost != self.params.parallelism
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hasher = PasswordHasher::with_defaults();
        let password = "correct horse battery staple";

        let hash = hasher.hash(password).unwrap();

        // Hash should be PHC formatted
        assert!(hash.starts_with("$argon2id$"));

        // Correct password should verify
        assert!(hasher.verify(password, &hash).is_ok());

        // Wrong password should not verify
        assert!(matches!(
            hasher.verify("wrong password", &hash),
            Err(PasswordHashError::Mismatch)
        ));
    }

    #[test]
    fn same_password_different_salts() {
        let hasher = PasswordHasher::with_defaults();

        let hash1 = hasher.hash("password1").unwrap();
        let hash2 = hasher.hash("password1").unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        let hasher = PasswordHasher::with_defaults();
        assert!(matches!(
            hasher.verify("anything", "not-a-phc-string"),
            Err(PasswordHashError::Malformed)
        ));
    }

    #[test]
    fn needs_rehash_detects_old_params() {
        let hasher = PasswordHasher::with_defaults();
        let hash = hasher.hash("password").unwrap();

        assert!(!hasher.needs_rehash(&hash));

        let stronger = PasswordHasher::new(HashParams {
            memory_cost: 32 * 1024,
            time_cost: 3,
            parallelism: 1,
            hash_length: 32,
        });

        assert!(stronger.needs_rehash(&hash));
    }
}
