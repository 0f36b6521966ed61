//! Password lifecycle endpoints.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use super::{client_ip, require_session, user_agent};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}

/// POST `/password/forgot`
///
/// The response is byte-identical whether or not the address exists; only
/// the mail dispatch differs. Anything that would make the two cases
/// distinguishable belongs on the other side of the mailer.
pub async fn forgot_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    if let Some(token) = state
        .passwords()
        .generate_reset_token(&request.email, &ip, &agent)
        .await?
    {
        let reset_url = format!(
            "{}/reset-password?token={}",
            state.config().base_url,
            urlencoding::encode(&token)
        );
        state
            .mailer()
            .send_password_reset(&request.email, &reset_url)
            .await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "If the email exists, a password reset link has been sent",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

/// POST `/password/reset`
pub async fn reset_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    state
        .passwords()
        .reset_password(&request.token, &request.new_password, &ip, &agent)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password has been reset",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// POST `/password/change` (authenticated)
pub async fn change_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers).await?;

    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    state
        .passwords()
        .change_password(
            session.user_id,
            &request.current_password,
            &request.new_password,
            &ip,
            &agent,
        )
        .await?;

    // The cascade just deleted every session, this one included; the client
    // is expected to log in again.
    Ok(Json(json!({
        "success": true,
        "message": "Password changed; please log in again",
    })))
}
