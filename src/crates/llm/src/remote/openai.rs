//! OpenAI chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::CompletionProvider;
use crate::remote::claude::map_status;
use crate::request::{CompletionRequest, CompletionResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: ProviderConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_config(ProviderConfig::new(api_key, DEFAULT_BASE_URL, model))
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self { config, client: Client::new() }
    }

    fn convert_response(&self, resp: OpenAiResponse, raw: Value) -> Result<CompletionResponse> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let usage = resp.usage.unwrap_or_default();
        Ok(CompletionResponse {
            text: choice.message.content.unwrap_or_default(),
            model: resp.model,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            raw,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(OpenAiMessage { role: "system", content: system });
        }
        messages.push(OpenAiMessage { role: "user", content: request.prompt });

        let body = OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_text));
        }

        let raw: Value = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let parsed: OpenAiResponse = serde_json::from_value(raw.clone())?;
        self.convert_response(parsed, raw)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
