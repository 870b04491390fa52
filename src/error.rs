use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level failure taxonomy. Every handler funnels errors through the
/// `IntoResponse` impl below, the single place where statuses and
/// user-facing messages are decided.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// Bad credentials or a bad/expired token. The message never reveals
    /// which part failed.
    #[error("{0}")]
    Authentication(String),
    /// Duplicate email or federated subject id.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// The mail channel failed after the pending token state was rolled back.
    #[error("{0}")]
    Delivery(String),
    /// Unexpected persistence failure. Details are logged, never returned.
    #[error("database error")]
    Store(#[source] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            // Unique indexes are how concurrent duplicate registrations are
            // resolved; the losing writer gets a user-facing conflict.
            if db_err.is_unique_violation() {
                let field = field_from_constraint(db_err.constraint());
                return ApiError::Conflict(format!("A user with that {field} already exists"));
            }
        }
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".into()),
            e => ApiError::Store(e),
        }
    }
}

fn field_from_constraint(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.contains("email") => "email",
        Some(c) if c.contains("google") => "Google account",
        _ => "value",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Delivery(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ApiError::Store(e) => {
                error!(error = %e, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
