//! # janus-oauth2
//!
//! The OAuth 2.0 authorization server core:
//!
//! - [`ClientRegistry`]: client registration, credential validation,
//!   redirect-URI and scope checks, soft revocation
//! - [`AuthorizationService`]: consent ledger and one-shot authorization
//!   code issuance with PKCE binding
//! - [`TokenService`]: the token endpoint grants (code exchange, refresh
//!   rotation, client credentials), revocation, and bearer introspection
//! - [`TokenSigner`] / [`TokenVerifier`]: RS256 JWT signing with a
//!   per-process key and verification against a set of public keys
//!
//! Everything adversarial lives here: one-shot redemption, replay
//! revocation, rotation ordering.

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod authorization;
pub mod claims;
pub mod client;
pub mod error;
pub mod signer;
pub mod token;

pub use authorization::{AuthorizationService, ConsentCheck};
pub use claims::AccessTokenClaims;
pub use client::{ClientRegistration, ClientRegistry};
pub use error::{ErrorResponse, OAuth2Error, OAuth2Result};
pub use signer::{TokenSigner, TokenVerifier};
pub use token::{TokenResponse, TokenService};

/// Splits a space-separated scope string per RFC 6749 §3.3.
#[must_use]
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scopes_splits_on_whitespace() {
        assert_eq!(parse_scopes("openid profile"), vec!["openid", "profile"]);
        assert_eq!(parse_scopes(""), Vec::<String>::new());
        assert_eq!(parse_scopes("  openid  "), vec!["openid"]);
    }
}
