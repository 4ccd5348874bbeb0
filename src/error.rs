//! Crate-wide error taxonomy
//!
//! `ApiError` is the single error type that crosses the Supervisor/Inspector
//! boundary into the HTTP layer. Every other component (`store`, `processor`,
//! `extractor`) has its own narrower error enum that converts into this one
//! at the boundary where it is no longer useful to keep the distinction.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// Result alias used throughout the Supervisor/HTTP boundary.
pub type ApiResult<T> = Result<T, ApiError>;

/// The error taxonomy from the control plane's design: each variant maps to
/// exactly one HTTP status and is otherwise transport-agnostic.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Requested id (consumer or group) is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body failed validation.
    #[error("bad config: {0}")]
    BadConfig(String),

    /// Processor `type` tag is not registered with the factory.
    #[error("unknown processor type: {0}")]
    UnknownType(String),

    /// Kafka client construction or initial connect failed.
    #[error("client init failed: {0}")]
    ClientInit(String),

    /// Specification Store failure.
    #[error("store error: {0}")]
    StoreIO(String),

    /// A bounded operation (stop, inspector query) exceeded its deadline.
    #[error("timed out: {0}")]
    TimedOut(String),

    /// Mutation observed inconsistent state; the per-id lock should make
    /// this rare but callers may still lose a create/delete race.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadConfig(_) | ApiError::UnknownType(_) => StatusCode::BAD_REQUEST,
            ApiError::ClientInit(_) => StatusCode::BAD_GATEWAY,
            ApiError::StoreIO(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound(id) => ApiError::NotFound(id),
            crate::store::StoreError::Conflict(msg) => ApiError::Conflict(msg),
            crate::store::StoreError::Io(msg) => ApiError::StoreIO(msg),
        }
    }
}

impl From<crate::extractor::ExtractorError> for ApiError {
    fn from(err: crate::extractor::ExtractorError) -> Self {
        match err {
            crate::extractor::ExtractorError::ClientInit(msg) => ApiError::ClientInit(msg),
            crate::extractor::ExtractorError::StopTimedOut => {
                ApiError::TimedOut("stop_timed_out".to_string())
            }
            crate::extractor::ExtractorError::Fatal(msg) => ApiError::ClientInit(msg),
        }
    }
}

impl From<crate::inspector::InspectorError> for ApiError {
    fn from(err: crate::inspector::InspectorError) -> Self {
        match err {
            crate::inspector::InspectorError::NotFound(msg) => ApiError::NotFound(msg),
            crate::inspector::InspectorError::ClientInit(msg) => ApiError::ClientInit(msg),
            crate::inspector::InspectorError::TimedOut => {
                ApiError::TimedOut("inspector call exceeded its deadline".to_string())
            }
        }
    }
}
