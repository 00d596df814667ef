use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::MessageResponse;

pub const NOT_FOUND_OR_FORBIDDEN: &str = "Post not found or user not authorized";
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// RepositoryError
///
/// Failures surfaced by the persistence layer. Each repository call is a single
/// attempt; these are reported once and never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    /// A unique index (username or email) rejected the write.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return RepositoryError::DuplicateKey(db_err.message().to_string());
            }
        }
        RepositoryError::Database(err.to_string())
    }
}

/// ApiError
///
/// Every way a request can fail. The two auth rejections answer with a bare 403
/// and no body; everything else uses the `{ success: false, message }` envelope.
#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    /// No `authorization` header, or one without a token segment.
    #[error("authorization header missing")]
    AuthRejected,
    /// Bad signature, malformed token or elapsed expiry.
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    DuplicateKey(String),
    #[error("{0}")]
    Validation(String),
    /// Deliberately ambiguous: the post does not exist or belongs to someone else.
    #[error("Post not found or user not authorized")]
    NotFoundOrForbidden,
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthRejected | ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::DuplicateKey(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateKey(msg) => ApiError::DuplicateKey(msg),
            RepositoryError::Database(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::AuthRejected | ApiError::InvalidToken => status.into_response(),
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "request failed");
                }
                let body = MessageResponse {
                    success: false,
                    message: other.to_string(),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}
