//! OAuth2 protocol error types.
//!
//! Error names follow RFC 6749; the HTTP layer renders them verbatim.

use janus_storage::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OAuth2 protocol errors.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    /// Invalid request parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Invalid, expired, used or mismatched grant.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Client is not authorized for this grant type.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Unsupported grant type.
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Unsupported response type.
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// Invalid scope.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// Resource owner denied the request.
    #[error("access_denied: {0}")]
    AccessDenied(String),

    /// Bearer token is invalid, expired or revoked.
    #[error("invalid_token: {0}")]
    InvalidToken(String),

    /// Token signing failed.
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    /// Server error.
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuth2Error {
    /// Returns the RFC 6749 error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::AccessDenied(_) => "access_denied",
            Self::InvalidToken(_) => "invalid_token",
            Self::TokenSigning(_) | Self::ServerError(_) => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_)
            | Self::InvalidScope(_) => 400,
            Self::InvalidClient(_) | Self::InvalidToken(_) => 401,
            Self::AccessDenied(_) | Self::UnauthorizedClient(_) => 403,
            Self::TokenSigning(_) | Self::ServerError(_) => 500,
        }
    }

    /// Creates the wire error response.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(self.to_string()),
        }
    }
}

impl From<StorageError> for OAuth2Error {
    fn from(err: StorageError) -> Self {
        Self::ServerError(err.to_string())
    }
}

/// OAuth 2.0 error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Result type for OAuth2 operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;
