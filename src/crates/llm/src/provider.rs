//! The provider contract every model client implements.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{CompletionRequest, CompletionResponse};

/// A model provider capable of serving completion requests.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently; the router may dispatch several calls against one instance.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name as configured in model specs ("anthropic", "openai", …).
    fn name(&self) -> &str;

    /// True only for stubbed providers that never perform a network
    /// round-trip. Real clients keep the default.
    fn simulated(&self) -> bool {
        false
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
