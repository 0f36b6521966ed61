//! Per-process RSA signing key material.
//!
//! The server generates one RSA-2048 key pair at startup and signs every
//! JWT it mints with it. There is no rotation; verifiers nevertheless accept
//! a set of public keys so a second key can be introduced without a protocol
//! change.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand_core::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

use crate::hash::sha256;

/// Default modulus size in bits.
const RSA_KEY_BITS: usize = 2048;

/// Key generation and encoding errors.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Key generation failed.
    #[error("key generation failed: {0}")]
    Generation(String),

    /// Key encoding failed.
    #[error("key encoding failed: {0}")]
    Encoding(String),
}

/// RSA key material for RS256 signing.
///
/// Holds the PEM encodings consumed by the JWT layer plus the raw public
/// components for JWK export. The private PEM never leaves this struct
/// except into the signing key constructor.
pub struct RsaKeyMaterial {
    key_id: String,
    private_key_pem: String,
    public_key_pem: String,
    modulus_b64: String,
    exponent_b64: String,
}

impl std::fmt::Debug for RsaKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyMaterial")
            .field("key_id", &self.key_id)
            .field("private_key_pem", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RsaKeyMaterial {
    /// Generates a fresh RSA-2048 key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if generation or encoding fails. Callers treat this
    /// as fatal at startup.
    pub fn generate() -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        Self::from_private_key(&private_key)
    }

    /// Builds key material from an existing private key.
    ///
    /// # Errors
    ///
    /// Returns an error if PEM encoding fails.
    pub fn from_private_key(private_key: &RsaPrivateKey) -> Result<Self, KeyError> {
        let public_key: RsaPublicKey = private_key.to_public_key();

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))?
            .to_string();

        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::Encoding(e.to_string()))?;

        let modulus_b64 = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let exponent_b64 = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        let key_id = derive_key_id(public_key_pem.as_bytes());

        Ok(Self {
            key_id,
            private_key_pem,
            public_key_pem,
            modulus_b64,
            exponent_b64,
        })
    }

    /// Returns the key ID.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns the PKCS#8 PEM encoding of the private key.
    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    /// Returns the SPKI PEM encoding of the public key.
    #[must_use]
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Returns the base64url modulus and exponent for JWK consumers.
    #[must_use]
    pub fn public_components(&self) -> (&str, &str) {
        (&self.modulus_b64, &self.exponent_b64)
    }

    /// Returns the public key as an RFC 7517 JWK.
    #[must_use]
    pub fn public_key_jwk(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "kid": self.key_id,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus_b64,
            "e": self.exponent_b64,
        })
    }
}

/// Derives a stable key ID from the public key bytes.
fn derive_key_id(public_key: &[u8]) -> String {
    let hash = sha256(public_key);
    URL_SAFE_NO_PAD.encode(&hash[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    // Key generation is expensive in debug builds; the tests share one.
    static MATERIAL: LazyLock<RsaKeyMaterial> =
        LazyLock::new(|| RsaKeyMaterial::generate().unwrap());

    #[test]
    fn key_id_is_deterministic() {
        let data = b"public key bytes";
        assert_eq!(derive_key_id(data), derive_key_id(data));
        assert_ne!(derive_key_id(data), derive_key_id(b"other bytes"));
    }

    #[test]
    fn generated_material_is_complete() {
        let material = &*MATERIAL;

        assert!(material.private_key_pem().contains("BEGIN PRIVATE KEY"));
        assert!(material.public_key_pem().contains("BEGIN PUBLIC KEY"));
        assert!(!material.key_id().is_empty());

        let (n, e) = material.public_components();
        assert!(!n.is_empty());
        // 65537 encodes to "AQAB"
        assert_eq!(e, "AQAB");
    }

    #[test]
    fn jwk_has_expected_fields() {
        let jwk = MATERIAL.public_key_jwk();

        assert_eq!(jwk["kty"], "RSA");
        assert_eq!(jwk["alg"], "RS256");
        assert_eq!(jwk["kid"], MATERIAL.key_id());
    }

    #[test]
    fn debug_redacts_private_key() {
        let rendered = format!("{:?}", &*MATERIAL);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("BEGIN PRIVATE KEY"));
    }
}
