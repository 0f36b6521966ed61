//! OAuth2 protocol endpoints.
//!
//! Validation order on `/oauth2/authorize` is security-ordered: the
//! redirect URI is checked against the client's registered set *before*
//! anything is redirected anywhere: an unvalidated redirect target is
//! never honored, errors included.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Form, OriginalUri, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use base64::Engine;
use janus_core::{AuditAction, AuditEvent};
use janus_model::OAuth2Client;
use janus_oauth2::{OAuth2Error, TokenResponse, parse_scopes};
use serde::Deserialize;
use serde_json::json;

use super::{client_ip, user_agent};
use crate::cookie::{bearer_token, session_token_from_cookie};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeParams {
    response_type: Option<String>,
    client_id: Option<String>,
    redirect_uri: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
}

/// GET `/oauth2/authorize`
pub async fn authorize(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> ApiResult<Response> {
    if params.response_type.as_deref() != Some("code") {
        return Ok(authorize_error(&OAuth2Error::UnsupportedResponseType(
            "only the authorization code flow is supported".to_string(),
        )));
    }

    let (Some(client_id), Some(redirect_uri)) =
        (params.client_id.as_deref(), params.redirect_uri.as_deref())
    else {
        return Ok(authorize_error(&OAuth2Error::InvalidRequest(
            "client_id and redirect_uri are required".to_string(),
        )));
    };

    // Attacker-controlled redirect_uri must not be honored: this failure
    // renders an error, it does not redirect.
    if !state
        .clients()
        .validate_redirect_uri(client_id, redirect_uri)
        .await?
    {
        return Ok(authorize_error(&OAuth2Error::InvalidClient(
            "invalid client_id or redirect_uri".to_string(),
        )));
    }

    // Principal must be authenticated; otherwise bounce to login with the
    // full authorization URL preserved.
    let session = match session_token_from_cookie(&headers) {
        Some(token) => match state.sessions().validate(&token).await {
            Ok(session) => session,
            Err(_) => return Ok(login_redirect(&original_uri.to_string())),
        },
        None => return Ok(login_redirect(&original_uri.to_string())),
    };

    let scopes = parse_scopes(params.scope.as_deref().unwrap_or_default());

    let consent = state
        .authorization()
        .check_consent(session.user_id, client_id, &scopes)
        .await?;

    if !consent.granted {
        return consent_page(&state, client_id, &params).await;
    }

    let code = state
        .authorization()
        .create_authorization_code(
            client_id,
            session.user_id,
            redirect_uri,
            scopes,
            params.code_challenge.clone(),
            params.code_challenge_method.clone(),
        )
        .await?;

    Ok(code_redirect(redirect_uri, &code, params.state.as_deref()))
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    client_id: String,
    redirect_uri: String,
    #[serde(default)]
    scope: String,
    state: Option<String>,
    code_challenge: Option<String>,
    code_challenge_method: Option<String>,
    approve: Option<String>,
}

/// POST `/oauth2/authorize/consent`
pub async fn authorize_consent(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> ApiResult<Response> {
    let token = session_token_from_cookie(&headers).ok_or_else(ApiError::unauthorized)?;
    let session = state.sessions().validate(&token).await?;

    // Deny and approve both redirect, so the redirect URI has to pass the
    // registry check first.
    if !state
        .clients()
        .validate_redirect_uri(&form.client_id, &form.redirect_uri)
        .await?
    {
        return Ok(authorize_error(&OAuth2Error::InvalidClient(
            "invalid client_id or redirect_uri".to_string(),
        )));
    }

    let ip = client_ip(&headers, &addr);
    let agent = user_agent(&headers);

    if form.approve.as_deref() != Some("true") {
        state
            .audit()
            .record(
                AuditEvent::builder(AuditAction::ConsentDenied)
                    .user(session.user_id)
                    .resource("oauth2")
                    .client(ip, agent)
                    .detail(form.client_id.clone())
                    .build(),
            )
            .await;

        return Ok(denied_redirect(&form.redirect_uri, form.state.as_deref()));
    }

    let scopes = parse_scopes(&form.scope);

    state
        .authorization()
        .grant_consent(session.user_id, &form.client_id, scopes.clone())
        .await?;

    state
        .audit()
        .record(
            AuditEvent::builder(AuditAction::ConsentGranted)
                .user(session.user_id)
                .resource("oauth2")
                .client(ip, agent)
                .detail(form.client_id.clone())
                .build(),
        )
        .await;

    let code = state
        .authorization()
        .create_authorization_code(
            &form.client_id,
            session.user_id,
            &form.redirect_uri,
            scopes,
            form.code_challenge.clone(),
            form.code_challenge_method.clone(),
        )
        .await?;

    Ok(code_redirect(&form.redirect_uri, &code, form.state.as_deref()))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    grant_type: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    code: Option<String>,
    redirect_uri: Option<String>,
    code_verifier: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// POST `/oauth2/token`
pub async fn token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // Client authentication first, for every grant.
    let (client_id, client_secret) = extract_client_credentials(&headers, &request)?;
    let client = state
        .clients()
        .validate(&client_id, client_secret.as_deref())
        .await?;

    let grant_type = request.grant_type.clone().unwrap_or_default();

    let response = match grant_type.as_str() {
        "authorization_code" => exchange_code(&state, &client, &request).await?,
        "refresh_token" => refresh_grant(&state, &client, &request).await?,
        "client_credentials" => {
            let scopes = parse_scopes(request.scope.as_deref().unwrap_or_default());
            state.tokens().client_credentials(&client, scopes).await?
        }
        other => {
            return Err(OAuth2Error::UnsupportedGrantType(format!(
                "grant type '{other}' is not supported"
            ))
            .into());
        }
    };

    state
        .audit()
        .record(
            AuditEvent::builder(AuditAction::TokenIssued)
                .resource("oauth2")
                .client(client_ip(&headers, &addr), user_agent(&headers))
                .detail(format!("{} ({grant_type})", client.client_id))
                .build(),
        )
        .await;

    Ok(Json(response))
}

async fn exchange_code(
    state: &AppState,
    client: &OAuth2Client,
    request: &TokenRequest,
) -> ApiResult<TokenResponse> {
    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OAuth2Error::InvalidRequest("code is required".to_string()))?;
    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OAuth2Error::InvalidRequest("redirect_uri is required".to_string()))?;

    Ok(state
        .tokens()
        .exchange_code(client, code, redirect_uri, request.code_verifier.as_deref())
        .await?)
}

async fn refresh_grant(
    state: &AppState,
    client: &OAuth2Client,
    request: &TokenRequest,
) -> ApiResult<TokenResponse> {
    let refresh_token = request
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuth2Error::InvalidRequest("refresh_token is required".to_string()))?;

    Ok(state.tokens().refresh(client, refresh_token).await?)
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    token: Option<String>,
    token_type_hint: Option<String>,
}

/// POST `/oauth2/revoke`
///
/// Responds 200 unconditionally: whether the token existed, was already
/// revoked, or was never ours is not observable from the outside.
pub async fn revoke(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Form(request): Form<RevokeRequest>,
) -> ApiResult<Response> {
    if let Some(token) = request.token.as_deref().filter(|t| !t.is_empty()) {
        state
            .tokens()
            .revoke(token, request.token_type_hint.as_deref())
            .await?;

        state
            .audit()
            .record(
                AuditEvent::builder(AuditAction::TokenRevoked)
                    .resource("oauth2")
                    .client(client_ip(&headers, &addr), user_agent(&headers))
                    .build(),
            )
            .await;
    }

    Ok(StatusCode::OK.into_response())
}

/// GET `/oauth2/userinfo`
pub async fn userinfo(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let token = bearer_token(&headers).ok_or_else(ApiError::invalid_token)?;

    let (_claims, record) = state.tokens().validate_bearer(&token).await?;

    let Some(user_id) = record.user_id else {
        // Client-credentials tokens carry no principal to describe.
        return Err(OAuth2Error::InvalidRequest(
            "token does not belong to a user".to_string(),
        )
        .into());
    };

    let user = state
        .users()
        .get_by_id(user_id)
        .await
        .map_err(janus_auth::AuthError::from)?
        .ok_or_else(ApiError::invalid_token)?;

    Ok(Json(json!({
        "sub": user.id,
        "name": user.name,
        "email": user.email,
        "email_verified": user.email_verified,
        "updated_at": user.updated_at.timestamp(),
    })))
}

/// GET `/oauth2/jwks`
pub async fn jwks(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.jwks().clone())
}

/// Extracts client credentials from Basic auth or the form body.
fn extract_client_credentials(
    headers: &HeaderMap,
    request: &TokenRequest,
) -> ApiResult<(String, Option<String>)> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| invalid_client("invalid authorization header"))?;

        if let Some(basic) = auth_str.strip_prefix("Basic ") {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(basic.trim())
                .map_err(|_| invalid_client("invalid basic auth encoding"))?;

            let credentials = String::from_utf8(decoded)
                .map_err(|_| invalid_client("invalid basic auth encoding"))?;

            let (client_id, client_secret) = credentials
                .split_once(':')
                .ok_or_else(|| invalid_client("invalid basic auth format"))?;

            let client_id = urlencoding::decode(client_id)
                .map_err(|_| invalid_client("invalid client_id encoding"))?
                .to_string();
            let client_secret = urlencoding::decode(client_secret)
                .map_err(|_| invalid_client("invalid client_secret encoding"))?
                .to_string();

            return Ok((client_id, Some(client_secret)));
        }
    }

    let client_id = request
        .client_id
        .clone()
        .ok_or_else(|| OAuth2Error::InvalidRequest("client_id is required".to_string()))?;

    Ok((client_id, request.client_secret.clone()))
}

fn invalid_client(message: &str) -> ApiError {
    OAuth2Error::InvalidClient(message.to_string()).into()
}

/// Renders an authorization-endpoint failure as 400 JSON.
///
/// The endpoint never redirects an error to an unvalidated URI, and unlike
/// the token endpoint it reports `invalid_client` as a plain bad request.
fn authorize_error(err: &OAuth2Error) -> Response {
    (StatusCode::BAD_REQUEST, Json(err.to_error_response())).into_response()
}

fn login_redirect(return_url: &str) -> Response {
    let login_url = format!("/login?return_url={}", urlencoding::encode(return_url));
    Redirect::to(&login_url).into_response()
}

fn code_redirect(redirect_uri: &str, code: &str, state: Option<&str>) -> Response {
    let mut url = format!("{redirect_uri}?code={}", urlencoding::encode(code));
    if let Some(state) = state {
        url.push_str(&format!("&state={}", urlencoding::encode(state)));
    }
    Redirect::to(&url).into_response()
}

fn denied_redirect(redirect_uri: &str, state: Option<&str>) -> Response {
    let mut url = format!("{redirect_uri}?error=access_denied");
    if let Some(state) = state {
        url.push_str(&format!("&state={}", urlencoding::encode(state)));
    }
    Redirect::to(&url).into_response()
}

/// Renders the consent prompt for the requested client and scopes.
async fn consent_page(
    state: &AppState,
    client_id: &str,
    params: &AuthorizeParams,
) -> ApiResult<Response> {
    // The redirect URI was validated, so the client exists; the name is
    // only for display.
    let client_name = state
        .clients()
        .get_active(client_id)
        .await
        .map(|c| c.name)
        .unwrap_or_else(|_| client_id.to_string());

    let scope = params.scope.clone().unwrap_or_default();
    let scope_items: String = parse_scopes(&scope)
        .iter()
        .map(|s| format!("<li>{}</li>", html_escape(s)))
        .collect();

    let hidden_fields = [
        ("client_id", Some(client_id.to_string())),
        ("redirect_uri", params.redirect_uri.clone()),
        ("scope", Some(scope)),
        ("state", params.state.clone()),
        ("code_challenge", params.code_challenge.clone()),
        ("code_challenge_method", params.code_challenge_method.clone()),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        value.map(|v| {
            format!(
                r#"<input type="hidden" name="{}" value="{}" />"#,
                name,
                html_escape(&v)
            )
        })
    })
    .collect::<Vec<_>>()
    .join("\n");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authorize {name}</title></head>
<body>
<h1>Authorize {name}</h1>
<p>{name} is requesting access to:</p>
<ul>{scopes}</ul>
<form method="post" action="/oauth2/authorize/consent">
{hidden}
<button type="submit" name="approve" value="true">Approve</button>
<button type="submit" name="approve" value="false">Deny</button>
</form>
</body>
</html>"#,
        name = html_escape(&client_name),
        scopes = scope_items,
        hidden = hidden_fields,
    );

    Ok((StatusCode::OK, Html(html)).into_response())
}

/// Minimal HTML escaping for the consent page.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn empty_request() -> TokenRequest {
        TokenRequest {
            grant_type: None,
            client_id: None,
            client_secret: None,
            code: None,
            redirect_uri: None,
            code_verifier: None,
            refresh_token: None,
            scope: None,
        }
    }

    #[test]
    fn extract_basic_auth_credentials() {
        let mut headers = HeaderMap::new();
        // "client_id:client_secret" base64 encoded
        headers.insert(
            AUTHORIZATION,
            "Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=".parse().unwrap(),
        );

        let (client_id, client_secret) =
            extract_client_credentials(&headers, &empty_request()).unwrap();
        assert_eq!(client_id, "client_id");
        assert_eq!(client_secret, Some("client_secret".to_string()));
    }

    #[test]
    fn extract_form_credentials() {
        let headers = HeaderMap::new();
        let request = TokenRequest {
            client_id: Some("form_client".to_string()),
            client_secret: Some("form_secret".to_string()),
            ..empty_request()
        };

        let (client_id, client_secret) =
            extract_client_credentials(&headers, &request).unwrap();
        assert_eq!(client_id, "form_client");
        assert_eq!(client_secret, Some("form_secret".to_string()));
    }

    #[test]
    fn missing_credentials_are_an_error() {
        let headers = HeaderMap::new();
        assert!(extract_client_credentials(&headers, &empty_request()).is_err());
    }

    #[test]
    fn html_escape_special_chars() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape(r#"x"y"#), "x&quot;y");
    }
}
