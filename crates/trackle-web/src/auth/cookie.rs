//! `auth_token` cookie transport for session tokens.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::error::AppError;

pub const AUTH_COOKIE: &str = "auth_token";

/// `Set-Cookie` value carrying `token` for `max_age_secs`.
pub fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> Result<HeaderValue, AppError> {
    let value = format!(
        "{AUTH_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax{}",
        if secure { "; Secure" } else { "" }
    );
    HeaderValue::from_str(&value)
        .map_err(|e| AppError::Internal(format!("Invalid cookie value: {e}")))
}

/// `Set-Cookie` value that makes the browser drop the token.
pub fn clear_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("auth_token=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax; Secure")
    } else {
        HeaderValue::from_static("auth_token=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
    }
}

pub fn set_cookie_headers(value: HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    headers
}

/// Reads the token from the request's `Cookie` header, if any.
pub fn token_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let value = session_cookie("abc.def.ghi", 86400, false).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "auth_token=abc.def.ghi; Max-Age=86400; Path=/; HttpOnly; SameSite=Lax"
        );

        let secure = session_cookie("t", 60, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = clear_cookie(false);
        assert!(value.to_str().unwrap().starts_with("auth_token=; Max-Age=0"));
    }

    #[test]
    fn reads_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; auth_token=xyz; lang=en"));
        assert_eq!(token_from_cookies(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert!(token_from_cookies(&headers).is_none());

        headers.insert(COOKIE, HeaderValue::from_static("auth_token="));
        assert!(token_from_cookies(&headers).is_none());
    }
}
