//! # janus-crypto
//!
//! Cryptographic primitives for the janus identity provider:
//!
//! - Argon2id password hashing with constant-time verification
//! - Password complexity policy with a bundled common-password list
//! - CSPRNG token generation for every token class the server mints
//! - PKCE S256 challenge computation and verification (RFC 7636)
//! - SHA-256 and HMAC-SHA-1 helpers (the latter only for RFC 6238 TOTP)
//! - Per-process RSA signing key material for RS256 JWTs

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod hash;
pub mod keys;
pub mod password;
pub mod pkce;
pub mod policy;
pub mod random;

pub use hash::{hmac_sha1, sha256, sha256_hex};
pub use keys::RsaKeyMaterial;
pub use password::{PasswordHashError, PasswordHasher};
pub use pkce::CodeChallengeMethod;
pub use policy::{PasswordPolicy, PolicyViolation};
