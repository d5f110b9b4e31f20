//! Request admission in front of the handlers.
//!
//! Two limiters run side by side: the default policy wraps every route and
//! the strict policy additionally wraps registration and login. Clients are
//! keyed by peer IP, or by the first `X-Forwarded-For` hop when
//! `rate_limit.trust_forwarded_for` is set.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use trackle_core::SlidingWindowLimiter;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_REJECTION: &str = "Rate limit exceeded. Please try again later.";
const STRICT_REJECTION: &str = "Too many authentication attempts. Please try again later.";

pub async fn default_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(&state, &state.access.default_limiter, DEFAULT_REJECTION, req, next).await
}

pub async fn strict_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    admit(&state, &state.access.strict_limiter, STRICT_REJECTION, req, next).await
}

async fn admit(
    state: &AppState,
    limiter: &SlidingWindowLimiter,
    rejection: &'static str,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&req, state.config.access.rate_limit.trust_forwarded_for);
    if !limiter.admit(&key) {
        tracing::warn!("Rate limited {} {} from {key}", req.method(), req.uri().path());
        return AppError::TooManyRequests(rejection).into_response();
    }
    next.run(req).await
}

fn client_key(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
