//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use janus_auth::AuthError;
use janus_oauth2::{ErrorResponse, OAuth2Error};
use serde_json::json;

/// Error type for every handler.
///
/// Carries the domain error and renders it as `{error, error_description?}`
/// with the §6 status mapping. Storage and internal failures collapse to a
/// bare `server_error`; details stay in the logs.
#[derive(Debug)]
pub enum ApiError {
    /// Authentication-domain error.
    Auth(AuthError),
    /// OAuth2-domain error.
    OAuth2(OAuth2Error),
    /// Request-shape error with an explicit status.
    Request(StatusCode, &'static str),
}

impl ApiError {
    /// 401 with an `invalid_token` body.
    #[must_use]
    pub const fn invalid_token() -> Self {
        Self::Request(StatusCode::UNAUTHORIZED, "invalid_token")
    }

    /// 401 for requests missing session authentication.
    #[must_use]
    pub const fn unauthorized() -> Self {
        Self::Request(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    /// 400 with an `invalid_request` body.
    #[must_use]
    pub const fn invalid_request() -> Self {
        Self::Request(StatusCode::BAD_REQUEST, "invalid_request")
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<OAuth2Error> for ApiError {
    fn from(err: OAuth2Error) -> Self {
        Self::OAuth2(err)
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::InvalidTotp
        | AuthError::SessionNotFound
        | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::AccountLocked { .. } | AuthError::AccountInactive => StatusCode::FORBIDDEN,
        AuthError::TotpNotSetup
        | AuthError::WrongCurrentPassword
        | AuthError::PasswordReused
        | AuthError::Policy(_)
        | AuthError::TokenNotFound
        | AuthError::TokenExpired
        | AuthError::TokenUsed => StatusCode::BAD_REQUEST,
        AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(err) => {
                let status = auth_status(&err);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "request failed");
                    return (
                        status,
                        Json(json!({ "error": "server_error" })),
                    )
                        .into_response();
                }
                (
                    status,
                    Json(json!({
                        "error": err.code(),
                        "error_description": err.to_string(),
                    })),
                )
                    .into_response()
            }
            Self::OAuth2(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "request failed");
                }
                let body: ErrorResponse = err.to_error_response();
                (status, Json(body)).into_response()
            }
            Self::Request(status, code) => {
                (status, Json(json!({ "error": code }))).into_response()
            }
        }
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_status_mapping() {
        assert_eq!(
            auth_status(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_status(&AuthError::AccountLocked { until: None }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            auth_status(&AuthError::PasswordReused),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            auth_status(&AuthError::Internal("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
