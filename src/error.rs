//! Provider errors.
//!
//! Every failure is reported to the host as an error diagnostic whose summary
//! is the `Display` form below, so the prefixes are user-facing.

use thiserror::Error;

/// Anything that can fail while serving a request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 404, or an object that vanished.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration values that cannot be used.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An API failure without a more specific variant.
    #[error("API error: {0}")]
    Api(String),

    /// Missing credentials, bad URLs, or a call before `Configure`.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No resource or data source with this type name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Malformed JSON in state, configuration or a response body.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request never got a response.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 409.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// HTTP 401 or 403.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 429.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// HTTP 5xx.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A request or a state wait ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The remote object is in a state that rules the operation out.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The resource type does not support the operation.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// HTTP 400.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Serialization(_) => "serialization error (see Debug output)",
            Self::Http(_) => "http error (see Debug output)",
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Api(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
        }
    }

    /// The error for a non-success HTTP `status` with response `body`.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 => Self::InvalidRequest(body),
            401 | 403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::ResourceExhausted(body),
            500..=599 => Self::Unavailable(format!("HTTP {}: {}", status, body)),
            _ => Self::Api(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Whether the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Rate limits, server errors and refused connections. Timeouts are not
    /// retried; they surface as [`DeadlineExceeded`](Self::DeadlineExceeded).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ResourceExhausted(_) | Self::Unavailable(_) => true,
            Self::Http(err) => err.is_connect(),
            _ => false,
        }
    }
}
