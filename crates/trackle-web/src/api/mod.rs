mod auth_handlers;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::rate_limit::{default_rate_limit, strict_rate_limit};
use crate::state::AppState;

/// Registration and sign-in, behind the strict limiter.
pub fn credential_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/google", post(auth_handlers::google_oauth))
        .layer(from_fn_with_state(state.clone(), strict_rate_limit))
}

pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/me", get(auth_handlers::me))
        .route(
            "/auth/username-available",
            get(auth_handlers::username_available),
        )
}

/// The full `/api` tree. The default limiter sits on the outer router so
/// unmatched paths are counted too.
pub fn app(state: AppState) -> Router {
    let api = credential_router(&state).merge(session_router());

    Router::new()
        .nest("/api", api)
        .layer(from_fn_with_state(state.clone(), default_rate_limit))
        .with_state(state)
}
