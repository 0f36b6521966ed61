//! RS256 token signing and verification.
//!
//! The signer holds the single per-process private key. The verifier holds
//! a *set* of public keys: the issuer only ever has one today, but accepting
//! several means a future second key needs no protocol change.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use janus_crypto::RsaKeyMaterial;

use crate::claims::AccessTokenClaims;
use crate::error::{OAuth2Error, OAuth2Result};

/// RS256 signer over the process key.
pub struct TokenSigner {
    kid: String,
    issuer: String,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("kid", &self.kid)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenSigner {
    /// Builds a signer from generated key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key PEM cannot be parsed.
    pub fn from_key_material(
        material: &RsaKeyMaterial,
        issuer: impl Into<String>,
    ) -> OAuth2Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(material.private_key_pem().as_bytes())
            .map_err(|e| OAuth2Error::TokenSigning(e.to_string()))?;

        Ok(Self {
            kid: material.key_id().to_string(),
            issuer: issuer.into(),
            encoding_key,
        })
    }

    /// Returns the signing key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Returns the issuer URL this signer stamps into tokens.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs an access token claim set.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, claims: &AccessTokenClaims) -> OAuth2Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        header.typ = Some("JWT".to_string());

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| OAuth2Error::TokenSigning(e.to_string()))
    }
}

/// RS256 verifier over a set of public keys.
pub struct TokenVerifier {
    issuer: String,
    keys: Vec<(String, DecodingKey)>,
}

impl TokenVerifier {
    /// Builds a verifier trusting the given key material.
    ///
    /// # Errors
    ///
    /// Returns an error if any public key cannot be parsed.
    pub fn from_key_material(
        materials: &[&RsaKeyMaterial],
        issuer: impl Into<String>,
    ) -> OAuth2Result<Self> {
        let mut keys = Vec::with_capacity(materials.len());
        for material in materials {
            let key = DecodingKey::from_rsa_pem(material.public_key_pem().as_bytes())
                .map_err(|e| OAuth2Error::ServerError(e.to_string()))?;
            keys.push((material.key_id().to_string(), key));
        }

        Ok(Self {
            issuer: issuer.into(),
            keys,
        })
    }

    /// Verifies a token's signature, issuer, expiry and not-before.
    ///
    /// The header `kid` selects the key when it matches one; otherwise every
    /// trusted key is tried, so tokens outlive a `kid` derivation change.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for anything that fails to verify.
    pub fn verify(&self, token: &str) -> OAuth2Result<AccessTokenClaims> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| OAuth2Error::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss"]);

        let candidates: Vec<&(String, DecodingKey)> = match header.kid.as_deref() {
            Some(kid) => {
                let matched: Vec<_> = self.keys.iter().filter(|(k, _)| k == kid).collect();
                if matched.is_empty() {
                    self.keys.iter().collect()
                } else {
                    matched
                }
            }
            None => self.keys.iter().collect(),
        };

        let mut last_error = OAuth2Error::InvalidToken("no trusted keys".to_string());
        for (_, key) in candidates {
            match decode::<AccessTokenClaims>(token, key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => last_error = OAuth2Error::InvalidToken(e.to_string()),
            }
        }

        Err(last_error)
    }
}
