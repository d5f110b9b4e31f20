use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The verified subject of a request's session token.
///
/// The token is taken from `Authorization: Bearer` first, then from the
/// `auth_token` cookie.
pub struct AuthUser {
    pub sub: u64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|s| s.trim().to_string());

        let token = bearer
            .or_else(|| super::cookie::token_from_cookies(&parts.headers))
            .ok_or_else(|| AppError::Auth("Missing authorization token".to_string()))?;

        let sub = state.access.tokens.verify(&token)?;

        Ok(AuthUser { sub })
    }
}
