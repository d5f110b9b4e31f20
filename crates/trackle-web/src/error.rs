use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use trackle_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    Auth(String),
    Validation(String),
    TooManyRequests(&'static str),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Core(err) => match err {
                CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                CoreError::Duplicate(kind) => (StatusCode::CONFLICT, kind.message().to_string()),
                CoreError::InvalidCredentials
                | CoreError::TokenExpired
                | CoreError::TokenInvalid => (StatusCode::UNAUTHORIZED, err.to_string()),
                CoreError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                _ => {
                    // Log the real error server-side, return generic message to client
                    tracing::error!("Internal error: {}", err);
                    internal()
                }
            },
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = ErrorBody {
            success: false,
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::Core(e)
    }
}
