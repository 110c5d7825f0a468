//! Shared client configuration for remote providers.

use serde::{Deserialize, Serialize};

/// Configuration for a remote provider client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    ///
    /// Examples:
    /// - Anthropic: "https://api.anthropic.com"
    /// - OpenAI: "https://api.openai.com/v1"
    /// - Gemini: "https://generativelanguage.googleapis.com/v1beta"
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,
}

impl ProviderConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
