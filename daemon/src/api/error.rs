use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use modelctl_core::{DownloadError, RegistryError, ThresholdError};
use serde::Serialize;

use crate::loader::LoadError;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: &'static str,
}

/// Error returned by every handler, rendered as an [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            kind: "invalid_state",
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request_error",
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            kind: "upstream_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                message: self.message,
                r#type: self.kind,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => Self::not_found(e.to_string()),
            RegistryError::Conflict { .. } => Self::conflict(e.to_string()),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(e: DownloadError) -> Self {
        match e {
            DownloadError::NotFound(_) => Self::not_found(e.to_string()),
            DownloadError::AlreadyInProgress(_)
            | DownloadError::InvalidState { .. }
            | DownloadError::LimitReached(_)
            | DownloadError::Cancelled(_) => Self::conflict(e.to_string()),
            DownloadError::Source(_) => Self::upstream(e.to_string()),
        }
    }
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NotFound(_) => Self::not_found(e.to_string()),
            LoadError::InvalidState { .. } => Self::conflict(e.to_string()),
            LoadError::LoadFailure { .. }
            | LoadError::UnloadFailure { .. }
            | LoadError::Interrupted(_)
            | LoadError::StatusUnavailable(_) => Self::upstream(e.to_string()),
        }
    }
}

impl From<ThresholdError> for ApiError {
    fn from(e: ThresholdError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            kind: "invalid_thresholds",
            message: e.to_string(),
        }
    }
}
