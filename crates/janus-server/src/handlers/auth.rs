//! Login, two-factor completion, logout, session refresh and listing.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use janus_model::{Session, User};
use janus_oauth2::AccessTokenClaims;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{UserSummary, client_ip, require_session, user_agent};
use crate::cookie::{clear_session_cookie, session_cookie, session_token_from_request};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Client id stamped into first-party identity assertions.
const FIRST_PARTY_CLIENT: &str = "janus-web";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    requires_2fa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserSummary>,
}

/// POST `/auth/login`
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    let outcome = state
        .authenticator()
        .login(&request.email, &request.password, &ip, &agent)
        .await?;

    if outcome.requires_two_factor {
        return Ok(Json(LoginResponse {
            success: true,
            requires_2fa: Some(true),
            temp_token: Some(outcome.session.token),
            access_token: None,
            refresh_token: None,
            session_token: None,
            user: None,
        })
        .into_response());
    }

    authenticated_response(&state, &outcome.user, &outcome.session)
}

#[derive(Debug, Deserialize)]
pub struct VerifyTwoFactorRequest {
    temp_token: String,
    code: String,
}

/// POST `/auth/verify-2fa`
pub async fn verify_two_factor(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<VerifyTwoFactorRequest>,
) -> ApiResult<Response> {
    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    let (user, session) = state
        .authenticator()
        .complete_two_factor(&request.temp_token, &request.code, &ip, &agent)
        .await?;

    authenticated_response(&state, &user, &session)
}

/// POST `/auth/logout`
pub async fn logout(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let token = session_token_from_request(&headers).ok_or_else(ApiError::invalid_request)?;

    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    state.authenticator().logout(&token, &ip, &agent).await?;

    let clear = clear_session_cookie(state.config().cookie_secure);
    Ok((
        [(header::SET_COOKIE, clear)],
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
        .into_response())
}

/// POST `/auth/refresh`: sliding session renewal, cookie only.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let token =
        crate::cookie::session_token_from_cookie(&headers).ok_or_else(ApiError::unauthorized)?;

    let session = state.sessions().renew(&token).await?;

    let cookie = session_cookie(
        &session.token,
        session.expires_at,
        state.config().cookie_secure,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "expires_at": session.expires_at })),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    id: Uuid,
    ip_address: String,
    user_agent: String,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    current: bool,
}

/// GET `/auth/sessions`: the caller's live sessions, tokens omitted.
pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let current = require_session(&state, &headers).await?;

    let sessions: Vec<SessionInfo> = state
        .sessions()
        .active_sessions(current.user_id)
        .await?
        .into_iter()
        .map(|s| SessionInfo {
            id: s.id,
            ip_address: s.ip_address,
            user_agent: s.user_agent,
            created_at: s.created_at,
            last_activity_at: s.last_activity_at,
            expires_at: s.expires_at,
            current: s.id == current.id,
        })
        .collect();

    Ok(Json(json!({ "sessions": sessions })))
}

/// DELETE `/auth/sessions`: log out everywhere else.
pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let current = require_session(&state, &headers).await?;

    let mut revoked = 0u64;
    for session in state.sessions().active_sessions(current.user_id).await? {
        if session.id != current.id {
            state.sessions().terminate(&session.token).await?;
            revoked += 1;
        }
    }

    Ok(Json(json!({ "success": true, "revoked": revoked })))
}

/// Builds the full-login response: session cookie plus first-party tokens.
fn authenticated_response(
    state: &AppState,
    user: &User,
    session: &Session,
) -> ApiResult<Response> {
    let (access_token, refresh_token) = first_party_tokens(state, user.id)?;

    let cookie = session_cookie(
        &session.token,
        session.expires_at,
        state.config().cookie_secure,
    );

    let body = LoginResponse {
        success: true,
        requires_2fa: None,
        temp_token: None,
        access_token: Some(access_token),
        refresh_token: Some(refresh_token),
        session_token: Some(session.token.clone()),
        user: Some(UserSummary::from(user)),
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Signs the identity assertions returned next to the session token.
///
/// These are conveniences for the first-party frontend; the session cookie
/// is what authenticates requests. Neither is stored, so neither survives
/// revocation checks at the userinfo endpoint: by design.
fn first_party_tokens(state: &AppState, user_id: Uuid) -> ApiResult<(String, String)> {
    let now = Utc::now();
    let config = state.config();

    let access_expires = now
        + chrono::Duration::from_std(config.access_token_duration())
            .unwrap_or_else(|_| chrono::Duration::hours(1));
    let refresh_expires = now
        + chrono::Duration::from_std(config.refresh_token_duration())
            .unwrap_or_else(|_| chrono::Duration::days(30));

    let access_claims = AccessTokenClaims::new(
        state.signer().issuer(),
        Some(user_id.to_string()),
        FIRST_PARTY_CLIENT,
        "profile",
        now,
        access_expires,
        Uuid::now_v7().to_string(),
    );

    let refresh_claims = AccessTokenClaims::new(
        state.signer().issuer(),
        Some(user_id.to_string()),
        FIRST_PARTY_CLIENT,
        "refresh",
        now,
        refresh_expires,
        Uuid::now_v7().to_string(),
    );

    let access = state.signer().sign(&access_claims).map_err(ApiError::from)?;
    let refresh = state.signer().sign(&refresh_claims).map_err(ApiError::from)?;

    Ok((access, refresh))
}
