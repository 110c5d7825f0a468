//! Error types for model provider calls.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when calling a model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport failure (connect, DNS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API rejected the credentials (401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No API key stored for this provider.
    #[error("missing credential for provider '{provider}'")]
    MissingCredential { provider: String },

    /// Provider is not one this crate knows how to build.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// Rate limit exceeded (429).
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider-side failure (5xx).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The request was malformed or rejected (other 4xx).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Response body did not match the provider's documented shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The call exceeded its per-call timeout. Counts as a failed attempt
    /// for retry purposes.
    #[error("call timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl LlmError {
    /// Whether a retry may succeed. Auth failures, malformed requests, and
    /// unknown providers never will.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::RateLimited(_) | Self::ServiceUnavailable(_) | Self::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl From<LlmError> for flow_core::FlowError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::MissingCredential { provider } => flow_core::FlowError::Credential { provider },
            LlmError::Timeout { millis } => flow_core::FlowError::Timeout {
                what: "provider call".to_string(),
                millis,
            },
            other => flow_core::FlowError::Provider(other.to_string()),
        }
    }
}
