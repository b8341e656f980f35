use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::posts::domain::PostError;
use crate::posts::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Incorrect PIN")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, slow down")]
    RateLimited,

    #[error("Proof of work is missing, expired or invalid")]
    ProofOfWorkInvalid,

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Validation(msg) => AppError::Validation(msg),
            PostError::NotFound => AppError::NotFound,
            PostError::Conflict(msg) => AppError::Conflict(msg),
            PostError::Unauthorized => AppError::Unauthorized,
            PostError::Hash(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Post not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::ProofOfWorkInvalid => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Repository(_) | AppError::Internal(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
