//! Anthropic Claude client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::CompletionProvider;
use crate::request::{CompletionRequest, CompletionResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Claude API client.
#[derive(Clone)]
pub struct ClaudeClient {
    config: ProviderConfig,
    client: Client,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_config(ProviderConfig::new(api_key, DEFAULT_BASE_URL, model))
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self { config, client: Client::new() }
    }

    fn convert_response(&self, resp: ClaudeResponse, raw: Value) -> CompletionResponse {
        let text = resp
            .content
            .iter()
            .filter_map(|block| {
                if block.content_type == "text" {
                    block.text.clone()
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            text,
            model: resp.model,
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
            raw,
        }
    }
}

#[async_trait]
impl CompletionProvider for ClaudeClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);

        let body = ClaudeRequest {
            model: self.config.model.clone(),
            messages: vec![ClaudeMessage { role: "user", content: request.prompt }],
            system: request.system,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_text));
        }

        let raw: Value = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let parsed: ClaudeResponse = serde_json::from_value(raw.clone())?;
        Ok(self.convert_response(parsed, raw))
    }
}

pub(crate) fn map_status(status: u16, body: String) -> LlmError {
    match status {
        401 | 403 => LlmError::Authentication(body),
        429 => LlmError::RateLimited(body),
        500..=599 => LlmError::ServiceUnavailable(format!("{}: {}", status, body)),
        _ => LlmError::InvalidRequest(format!("{}: {}", status, body)),
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
    model: String,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u64,
    output_tokens: u64,
}
