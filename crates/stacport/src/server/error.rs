//! API error type and its JSON response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::s3::S3Error;
use crate::stac::StacError;

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let status = match self {
            Self::BadRequest(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Unprocessable(_) => 422,
            Self::Internal(_) => 500,
            Self::Provider(e) => e.status_code(),
        };
        StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
    }
}

impl From<StacError> for ApiError {
    fn from(err: StacError) -> Self {
        match err {
            StacError::Unprocessable(message) => Self::Unprocessable(message),
            StacError::BadRequest(message) => Self::BadRequest(message),
            StacError::Provider(e) => Self::Provider(e),
        }
    }
}

impl From<S3Error> for ApiError {
    fn from(err: S3Error) -> Self {
        Self::Internal(format!("S3 client error: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %detail, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %detail, "request rejected");
        }
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
