//! Session cookie handling.
//!
//! The cookie is `session_token`: HttpOnly, SameSite=Lax, Secure when the
//! deployment says so, expiry matching the session record. Logout also
//! accepts the token as a bearer header for non-browser clients.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_token";

/// Builds the `Set-Cookie` value for a session token.
#[must_use]
pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let expires = expires_at.format("%a, %d %b %Y %H:%M:%S GMT");
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Expires={expires}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds a `Set-Cookie` value that clears the session cookie.
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extracts the session token from the request cookie.
#[must_use]
pub fn session_token_from_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extracts the session token from the cookie or a bearer header.
#[must_use]
pub fn session_token_from_request(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = session_token_from_cookie(headers) {
        return Some(token);
    }

    bearer_token(headers)
}

/// Extracts a bearer token from the `Authorization` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{AUTHORIZATION, COOKIE};

    #[test]
    fn cookie_attributes() {
        let expires_at = Utc::now() + chrono::Duration::hours(1);
        let cookie = session_cookie("tok123", expires_at, false);

        assert!(cookie.starts_with("session_token=tok123; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(!cookie.contains("Secure"));

        let secure = session_cookie("tok123", expires_at, true);
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_in_the_past() {
        let cookie = clear_session_cookie(false);
        assert!(cookie.contains("1970"));
        assert!(cookie.starts_with("session_token=;"));
    }

    #[test]
    fn token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "other=x; session_token=abc123; more=y".parse().unwrap());

        assert_eq!(
            session_token_from_cookie(&headers),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer tok456".parse().unwrap());

        assert_eq!(session_token_from_cookie(&headers), None);
        assert_eq!(
            session_token_from_request(&headers),
            Some("tok456".to_string())
        );
    }

    #[test]
    fn missing_token_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_token_from_request(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "session_token=".parse().unwrap());
        assert_eq!(session_token_from_cookie(&headers), None);
    }
}
