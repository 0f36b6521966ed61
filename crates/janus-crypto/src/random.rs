//! Cryptographically secure random generation.
//!
//! One function per token class the server mints, so entropy requirements
//! live in exactly one place:
//!
//! - Session tokens: 64 bytes
//! - Authorization codes, refresh tokens, client secrets, reset tokens: 32 bytes
//! - Client identifiers: 16 bytes
//! - TOTP secrets: 20 bytes (160 bits, base32)
//!
//! All output is URL-safe base64 without padding, except the TOTP secret
//! which is base32 per RFC 6238 tooling conventions.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Generates `len` cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a URL-safe base64-encoded random string from `byte_len` bytes.
///
/// The output carries `byte_len * 8` bits of entropy and is roughly 4/3 of
/// `byte_len` characters long.
#[must_use]
pub fn random_base64url(byte_len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(byte_len))
}

/// Generates a session token (64 bytes, 512 bits of entropy).
#[must_use]
pub fn generate_session_token() -> String {
    random_base64url(64)
}

/// Generates a one-shot authorization code (32 bytes).
#[must_use]
pub fn generate_auth_code() -> String {
    random_base64url(32)
}

/// Generates an opaque refresh token (32 bytes).
#[must_use]
pub fn generate_refresh_token() -> String {
    random_base64url(32)
}

/// Generates a password reset token (32 bytes).
#[must_use]
pub fn generate_reset_token() -> String {
    random_base64url(32)
}

/// Generates an OAuth2 client identifier (16 bytes, 128 bits).
#[must_use]
pub fn generate_client_id() -> String {
    random_base64url(16)
}

/// Generates an OAuth2 client secret (32 bytes, 256 bits).
///
/// Returned to the registrant exactly once; only its hash is stored.
#[must_use]
pub fn generate_client_secret() -> String {
    random_base64url(32)
}

/// Generates a 160-bit TOTP secret, base32-encoded without padding.
#[must_use]
pub fn generate_totp_secret() -> String {
    base32::encode(
        base32::Alphabet::Rfc4648 { padding: false },
        &random_bytes(20),
    )
}

/// Generates `count` backup codes of eight characters each.
///
/// Codes are short enough to type from paper; they are stored hashed.
#[must_use]
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let encoded = random_base64url(6);
            encoded.chars().take(8).collect()
        })
        .collect()
}
