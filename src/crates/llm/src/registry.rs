//! Provider construction from model specs.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use flow_core::ModelSpec;

use crate::credentials::CredentialStore;
use crate::error::{LlmError, Result};
use crate::provider::CompletionProvider;
use crate::remote::{ClaudeClient, GeminiClient, OpenAiClient};
use crate::simulated::SimulatedProvider;

/// Builds a provider client for a model spec. A trait so tests and preview
/// surfaces can inject scripted providers without touching the router.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn provider_for(
        &self,
        user_id: &str,
        spec: &ModelSpec,
    ) -> Result<Arc<dyn CompletionProvider>>;
}

/// Production factory: looks up the API key for `(user_id, provider)` and
/// builds the matching client. A missing key is a hard error.
pub struct CredentialProviderFactory {
    credentials: Arc<dyn CredentialStore>,
}

impl CredentialProviderFactory {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }

    async fn require_key(&self, user_id: &str, provider: &str) -> Result<String> {
        self.credentials
            .api_key(user_id, provider)
            .await?
            .ok_or_else(|| LlmError::MissingCredential { provider: provider.to_string() })
    }
}

#[async_trait]
impl ProviderFactory for CredentialProviderFactory {
    async fn provider_for(
        &self,
        user_id: &str,
        spec: &ModelSpec,
    ) -> Result<Arc<dyn CompletionProvider>> {
        let provider = spec.provider.to_lowercase();
        debug!(provider = %provider, model = %spec.model, "building provider client");

        match provider.as_str() {
            "anthropic" | "claude" => {
                let key = self.require_key(user_id, "anthropic").await?;
                Ok(Arc::new(ClaudeClient::new(key, spec.model.clone())))
            }
            "openai" => {
                let key = self.require_key(user_id, "openai").await?;
                Ok(Arc::new(OpenAiClient::new(key, spec.model.clone())))
            }
            "google" | "gemini" => {
                let key = self.require_key(user_id, "google").await?;
                Ok(Arc::new(GeminiClient::new(key, spec.model.clone())))
            }
            "simulated" => Ok(Arc::new(SimulatedProvider::new(spec.model.clone()))),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}
