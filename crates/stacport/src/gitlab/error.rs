//! Error types for GitLab API operations.

use thiserror::Error;

use crate::http::HttpError;
use crate::provider::ProviderError;

/// Errors that can occur when interacting with the GitLab API.
#[derive(Debug, Error)]
pub enum GitLabError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned a non-2xx response.
    #[error("HTTP {status} | {method} {url}: {body}")]
    Api {
        status: u16,
        method: String,
        url: String,
        body: String,
    },

    /// GraphQL answered without data.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// A payload did not have the expected shape.
    #[error("{0}")]
    Shape(String),

    /// Pagination metadata was missing or unusable.
    #[error("{0}")]
    Pagination(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl GitLabError {
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }
}

impl From<GitLabError> for ProviderError {
    fn from(err: GitLabError) -> Self {
        let message = err.to_string();
        match err {
            GitLabError::Http(HttpError::Timeout(_)) => ProviderError::Timeout { message },
            GitLabError::Http(_) => ProviderError::Network { message },
            GitLabError::Json(_) => ProviderError::unexpected_shape(format!(
                "Unexpected response from GitLab: {message}"
            )),
            GitLabError::Api { status: 404, .. } => ProviderError::NotFound { resource: message },
            GitLabError::Api { status, .. } => ProviderError::Upstream { status, message },
            GitLabError::GraphQl(_) | GitLabError::Shape(_) => {
                ProviderError::UnexpectedResponseShape { message }
            }
            GitLabError::Pagination(_) => ProviderError::MalformedPagination { message },
            GitLabError::Config(_) => ProviderError::Internal { message },
        }
    }
}
