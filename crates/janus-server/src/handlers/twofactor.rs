//! Two-factor enrollment endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use super::require_session;
use crate::error::ApiResult;
use crate::state::AppState;

/// POST `/auth/2fa/setup` (authenticated)
///
/// Returns the secret, provisioning URI and backup codes: the only time
/// any of them cross the wire.
pub async fn setup(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers).await?;

    let setup = state.totp().setup(session.user_id).await?;

    Ok(Json(json!({
        "secret": setup.secret,
        "provisioning_uri": setup.provisioning_uri,
        "backup_codes": setup.backup_codes,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    code: String,
}

/// POST `/auth/2fa/verify` (authenticated): enables the pending enrollment.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers).await?;

    state
        .totp()
        .verify_and_enable(session.user_id, &request.code)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Two-factor authentication enabled",
    })))
}

/// POST `/auth/2fa/disable` (authenticated)
pub async fn disable(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers).await?;

    state.totp().disable(session.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Two-factor authentication disabled",
    })))
}
