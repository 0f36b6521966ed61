//! PKCE challenge computation and verification (RFC 7636).
//!
//! `S256` is the supported transformation; `plain` is accepted for
//! compatibility. Any other method is rejected outright.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{constant_time_eq, sha256};

/// PKCE errors.
#[derive(Debug, Error)]
pub enum PkceError {
    /// The challenge method is neither `S256` nor `plain`.
    #[error("unsupported code challenge method: {0}")]
    UnsupportedMethod(String),
}

/// Code challenge transformation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// `challenge = BASE64URL(SHA256(verifier))`.
    S256,
    /// `challenge = verifier`. Kept for legacy clients only.
    Plain,
}

impl CodeChallengeMethod {
    /// Returns the wire name of the method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl std::str::FromStr for CodeChallengeMethod {
    type Err = PkceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Computes the S256 challenge for a verifier.
#[must_use]
pub fn code_challenge_s256(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(sha256(verifier.as_bytes()))
}

/// Verifies a code verifier against a recorded challenge.
///
/// Comparison is constant-time in both branches.
#[must_use]
pub fn verify_code_challenge(
    verifier: &str,
    challenge: &str,
    method: CodeChallengeMethod,
) -> bool {
    match method {
        CodeChallengeMethod::Plain => constant_time_eq(verifier.as_bytes(), challenge.as_bytes()),
        CodeChallengeMethod::S256 => {
            let computed = code_challenge_s256(verifier);
            constant_time_eq(computed.as_bytes(), challenge.as_bytes())
        }
    }
}
