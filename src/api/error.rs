//! API error type and the failure envelope `{success: false, message, code?}`.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::authorization::Denial;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::identity::AuthError;
use crate::orders::TransitionError;
use crate::token::TokenError;

/// Whether internal error detail is rendered into responses. Off in production.
static EXPOSE_DETAIL: AtomicBool = AtomicBool::new(false);

pub fn set_expose_detail(expose: bool) {
    EXPOSE_DETAIL.store(expose, Ordering::Relaxed);
}

/// Failure envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Denied: {}", .0.code())]
    Denied(Denial),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut detail = None;
        let (status, code, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, None, message),
            ApiError::Unauthenticated(message) => (StatusCode::UNAUTHORIZED, None, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, None, message),
            ApiError::Denied(denial) => {
                (StatusCode::FORBIDDEN, Some(denial.code()), denial.message())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, None, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, None, message),
            ApiError::Internal(internal) => {
                tracing::error!(detail = %internal, "API internal error");
                if EXPOSE_DETAIL.load(Ordering::Relaxed) {
                    detail = Some(internal);
                }
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    None,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            message,
            code,
            detail,
        };
        (status, Json(body)).into_response()
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        ApiError::Denied(denial)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(_) => {
                ApiError::Validation("A record with the same identifier already exists".into())
            }
            DatabaseError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(DatabaseError::from(err))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ApiError::from(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::Unauthenticated("Token expired".into()),
            TokenError::Malformed | TokenError::BadSignature => {
                ApiError::Unauthenticated("Invalid token".into())
            }
            TokenError::Encoding(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthenticated("Invalid credentials".into()),
            AuthError::StaleCredential => ApiError::Unauthenticated(
                "Password changed recently, please log in again".into(),
            ),
            AuthError::Inactive => ApiError::Unauthenticated("Account is not active".into()),
            AuthError::Token(e) => ApiError::from(e),
            AuthError::Core(e) => ApiError::from(e),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAllowed { .. } => ApiError::Validation(err.to_string()),
            TransitionError::Conflict => ApiError::Conflict(err.to_string()),
        }
    }
}
