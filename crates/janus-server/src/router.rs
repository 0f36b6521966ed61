//! Router configuration.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, oauth2, password, twofactor};
use crate::state::AppState;

/// Per-request deadline; store futures are dropped when it fires.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/verify-2fa", post(auth::verify_two_factor))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/refresh", post(auth::refresh))
        .route(
            "/auth/sessions",
            get(auth::list_sessions).delete(auth::revoke_other_sessions),
        )
        .route("/auth/2fa/setup", post(twofactor::setup))
        .route("/auth/2fa/verify", post(twofactor::verify))
        .route("/auth/2fa/disable", post(twofactor::disable));

    let password_routes = Router::new()
        .route("/password/forgot", post(password::forgot_password))
        .route("/password/reset", post(password::reset_password))
        .route("/password/change", post(password::change_password));

    let oauth2_routes = Router::new()
        .route("/oauth2/authorize", get(oauth2::authorize))
        .route("/oauth2/authorize/consent", post(oauth2::authorize_consent))
        .route("/oauth2/token", post(oauth2::token))
        .route("/oauth2/revoke", post(oauth2::revoke))
        .route("/oauth2/userinfo", get(oauth2::userinfo))
        .route("/oauth2/jwks", get(oauth2::jwks));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(auth_routes)
        .merge(password_routes)
        .merge(oauth2_routes)
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(cors)
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_reports_healthy() {
        let response = health_check().await;
        assert_eq!(response.0.status, "healthy");
    }
}
