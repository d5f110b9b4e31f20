use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use trackle_core::validation::{check_email, check_required};
use trackle_core::{AccessControl, CoreResult, FederatedClaim, RegisterRequest};

use crate::auth::cookie;
use crate::auth::middleware::AuthUser;
use crate::dto::*;
use crate::error::AppError;
use crate::state::AppState;

/// Runs a core operation off the async runtime; argon2 is deliberately slow.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&AccessControl) -> CoreResult<T> + Send + 'static,
{
    let access = state.access.clone();
    tokio::task::spawn_blocking(move || op(&access))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::Validation(e.body_text()))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterResponse>>), AppError> {
    let body = json_body(payload)?;

    let user = blocking(&state, move |access| access.registrar.register(body)).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User created successfully", RegisterResponse { user })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(axum::http::HeaderMap, Json<ApiResponse<LoginResponse>>), AppError> {
    let body = json_body(payload)?;
    check_email(&body.email)?;
    check_required("Password", &body.password)?;

    let issued = blocking(&state, move |access| {
        access.gate.login(&body.email, &body.password)
    })
    .await?;

    let cookie = cookie::session_cookie(
        &issued.token,
        state.access.tokens.ttl_secs(),
        state.config.secure_cookies(),
    )?;

    Ok((
        cookie::set_cookie_headers(cookie),
        Json(ApiResponse::ok(
            "Login successful",
            LoginResponse {
                token: issued.token,
                expires_at: issued.expires_at,
            },
        )),
    ))
}

/// Tokens are stateless, so logout only tells the browser to drop its copy.
pub async fn logout(
    State(state): State<AppState>,
) -> (axum::http::HeaderMap, Json<ApiResponse<()>>) {
    (
        cookie::set_cookie_headers(cookie::clear_cookie(state.config.secure_cookies())),
        Json(ApiResponse::message("Logged out successfully")),
    )
}

pub async fn me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let identity = state.access.gate.current_identity(user.sub)?;
    Ok(Json(ApiResponse::ok(
        "User retrieved successfully",
        MeResponse::from(identity),
    )))
}

pub async fn username_available(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UsernameAvailability>, AppError> {
    let username = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("Username is required".to_string()))?;

    let available = state.access.gate.username_available(&username)?;
    let message = if available {
        "Username is available"
    } else {
        "Username is already taken"
    };

    Ok(Json(UsernameAvailability {
        available,
        message: message.to_string(),
    }))
}

pub async fn google_oauth(
    State(state): State<AppState>,
    payload: Result<Json<FederatedClaim>, JsonRejection>,
) -> Result<(axum::http::HeaderMap, Json<ApiResponse<OAuthResponse>>), AppError> {
    let claim = json_body(payload)?;

    let outcome = blocking(&state, move |access| access.linker.link_or_create(claim)).await?;

    let cookie = cookie::session_cookie(
        &outcome.token.token,
        state.access.tokens.ttl_secs(),
        state.config.secure_cookies(),
    )?;

    let message = if outcome.is_new {
        "Google OAuth registration successful"
    } else {
        "Google OAuth login successful"
    };

    Ok((
        cookie::set_cookie_headers(cookie),
        Json(ApiResponse::ok(
            message,
            OAuthResponse {
                token: outcome.token.token,
                expires_at: outcome.token.expires_at,
                user: outcome.identity,
                is_new: outcome.is_new,
            },
        )),
    ))
}
