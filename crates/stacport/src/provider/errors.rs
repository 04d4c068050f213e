use thiserror::Error;

/// Errors surfaced by a provider client.
///
/// Every variant maps onto a single HTTP status at the API boundary; none of
/// them is retried inside the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A project, path or id could not be resolved.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Upstream answered with something other than the documented shape.
    #[error("Unexpected response from upstream: {message}")]
    UnexpectedResponseShape { message: String },

    /// Pagination metadata was missing or could not be interpreted.
    #[error("Malformed pagination: {message}")]
    MalformedPagination { message: String },

    /// A project's topics do not resolve to any configured category.
    #[error("Category not found in {topics:?}")]
    CategoryResolution { topics: Vec<String> },

    /// Upstream returned a non-2xx status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The caller asked for something the provider cannot serve.
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// An outbound call exceeded its timeout. Callers may retry.
    #[error("Upstream timed out: {message}")]
    Timeout { message: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Unexpected/internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProviderError {
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn unexpected_shape(message: impl Into<String>) -> Self {
        Self::UnexpectedResponseShape {
            message: message.into(),
        }
    }

    #[inline]
    pub fn malformed_pagination(message: impl Into<String>) -> Self {
        Self::MalformedPagination {
            message: message.into(),
        }
    }

    #[inline]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code equivalent of this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::UnexpectedResponseShape { .. } => 422,
            Self::MalformedPagination { .. } => 500,
            Self::CategoryResolution { .. } => 500,
            Self::Upstream { status, .. } => *status,
            Self::InvalidQuery { .. } => 400,
            Self::Timeout { .. } => 504,
            Self::Network { .. } => 502,
            Self::Internal { .. } => 500,
        }
    }

    /// Whether repeating the same call later may succeed.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Network { .. })
            || matches!(self, Self::Upstream { status, .. } if *status == 429 || *status >= 502)
    }
}

/// Extract a short error message suitable for logs.
///
/// Takes the first line of an error message, which keeps upstream HTML error
/// pages out of single-line log records.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
