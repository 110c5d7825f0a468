//! Error types for the workflow engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while validating, resolving, executing, or
/// scheduling workflows.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Bad step or trigger configuration. Always surfaced before execution
    /// starts, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A binding token could not be resolved against the run context.
    #[error("cannot resolve token '{token}': {reason}")]
    Resolution { token: String, reason: String },

    /// A token referenced a step whose order is not strictly before the
    /// referencing step. Raised by order, not existence.
    #[error(
        "forward reference in token '{token}': step '{step_id}' has order {target_order}, \
         referenced from order {current_order}"
    )]
    ForwardReference {
        token: String,
        step_id: String,
        target_order: u32,
        current_order: u32,
    },

    /// A model provider call failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Every model in the routing set exhausted its retry policy.
    #[error("all providers failed for step '{step_id}' ({attempted} models attempted)")]
    AllProvidersFailed { step_id: String, attempted: usize },

    /// An individual provider or webhook call timed out.
    #[error("{what} timed out after {millis}ms")]
    Timeout { what: String, millis: u64 },

    /// No API key stored for the given provider.
    #[error("missing credential for provider '{provider}'")]
    Credential { provider: String },

    /// Inbound webhook signature missing or mismatched.
    #[error("webhook signature rejected: {0}")]
    Signature(String),

    /// Malformed cron expression or other scheduling misconfiguration.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// DECISION step with no matching rule and no default choice.
    #[error("decision step '{step_id}': no rule matched and no default choice configured")]
    UnresolvedDecision { step_id: String },

    /// Failure in an external store.
    #[error("store error: {0}")]
    Store(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Execution was cancelled by request.
    #[error("execution cancelled")]
    Cancelled,

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl FlowError {
    /// Shorthand for a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a resolution error naming the offending token.
    pub fn resolution(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            token: token.into(),
            reason: reason.into(),
        }
    }
}
