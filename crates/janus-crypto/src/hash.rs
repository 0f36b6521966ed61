//! Digest and HMAC helpers.
//!
//! SHA-256 is the working hash for token fingerprints (access and refresh
//! token records store `SHA256(token)`, never the token itself) and for PKCE.
//! HMAC-SHA-1 exists solely for RFC 6238 TOTP verification.

use aws_lc_rs::{digest, hmac};

/// Computes a SHA-256 hash of the input data.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

/// Computes a SHA-256 hash and returns it hex-encoded.
///
/// This is the storage form of token fingerprints.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = sha256(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Computes HMAC-SHA-1.
///
/// # Warning
///
/// SHA-1 is deprecated for general cryptographic use. This function exists
/// solely for TOTP compatibility per RFC 6238.
#[must_use]
pub fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let signing_key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    hmac::sign(&signing_key, data).as_ref().to_vec()
}

/// Constant-time comparison of two byte slices.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_produces_correct_length() {
        assert_eq!(sha256(b"test").len(), 32);
    }

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256(b"hello world"), sha256(b"hello world"));
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn sha256_hex_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hmac_sha1_produces_correct_length() {
        assert_eq!(hmac_sha1(b"key", b"data").len(), 20);
    }

    #[test]
    fn hmac_is_keyed() {
        assert_ne!(hmac_sha1(b"key1", b"data"), hmac_sha1(b"key2", b"data"));
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
    }
}
