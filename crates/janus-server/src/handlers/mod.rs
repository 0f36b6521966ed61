//! Request handlers.

pub mod auth;
pub mod oauth2;
pub mod password;
pub mod twofactor;

use std::net::SocketAddr;

use axum::http::HeaderMap;
use janus_model::Session;
use serde::Serialize;

use crate::cookie::session_token_from_request;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Client IP, honoring the first `X-Forwarded-For` hop.
#[must_use]
pub fn client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

/// User agent string, empty when absent.
#[must_use]
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Resolves the calling session from cookie or bearer header.
///
/// # Errors
///
/// 401 when no token is presented or it does not validate.
pub async fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let token = session_token_from_request(headers).ok_or_else(ApiError::unauthorized)?;
    Ok(state.sessions().validate(&token).await?)
}

/// The user object returned by login-family endpoints.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    /// Principal id.
    pub id: uuid::Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
}

impl From<&janus_model::User> for UserSummary {
    fn from(user: &janus_model::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer_address() {
        let addr: SocketAddr = "10.0.0.9:443".parse().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, &addr), "203.0.113.7");

        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, &addr), "10.0.0.9");
    }
}
