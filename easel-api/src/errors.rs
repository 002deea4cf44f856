use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to API clients. Everything maps to a status code and a
/// JSON `{error_message}` body; storage-level failures collapse into an
/// opaque 500 after being logged.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Unprocessable(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("too many requests")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        if let ApiError::TooManyRequests { retry_after_secs } = self {
            return (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}

impl From<easel_store::StoreError> for ApiError {
    fn from(err: easel_store::StoreError) -> Self {
        match err {
            easel_store::StoreError::EmailTaken => ApiError::Conflict("email already registered"),
            other => {
                tracing::error!("store error: {other}");
                ApiError::Internal
            }
        }
    }
}

impl From<easel_store::BlobError> for ApiError {
    fn from(err: easel_store::BlobError) -> Self {
        // A hash referenced by a row but missing from the blob store is an
        // internal inconsistency, not a client-visible 404.
        tracing::error!("blob store error: {err}");
        ApiError::Internal
    }
}
