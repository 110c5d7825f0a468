//! Stubbed provider for preview runs and tests.

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::provider::CompletionProvider;
use crate::request::{CompletionRequest, CompletionResponse};

/// A provider that echoes the prompt without any network round-trip.
///
/// Results produced here are flagged `simulated`; real clients never are.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    model: String,
}

impl SimulatedProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

#[async_trait]
impl CompletionProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    fn simulated(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let input_tokens = request.prompt.split_whitespace().count() as u64;
        let text = format!("[{}] {}", self.model, request.prompt);
        let output_tokens = text.split_whitespace().count() as u64;

        Ok(CompletionResponse {
            raw: json!({"provider": "simulated", "model": self.model}),
            model: self.model.clone(),
            input_tokens,
            output_tokens,
            text,
        })
    }
}
