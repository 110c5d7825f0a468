//! Google Gemini client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::provider::CompletionProvider;
use crate::remote::claude::map_status;
use crate::request::{CompletionRequest, CompletionResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    config: ProviderConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_config(ProviderConfig::new(api_key, DEFAULT_BASE_URL, model))
    }

    pub fn with_config(config: ProviderConfig) -> Self {
        Self { config, client: Client::new() }
    }

    fn convert_response(&self, resp: GeminiResponse, raw: Value) -> Result<CompletionResponse> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no candidates in response".to_string()))?;

        let text = candidate
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect::<Vec<_>>()
            .join("");

        let usage = resp.usage_metadata.unwrap_or_default();
        Ok(CompletionResponse {
            text,
            model: self.config.model.clone(),
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            raw,
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> &str {
        "google"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: Some(request.prompt) }],
            }],
            system_instruction: request.system.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: Some(text) }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        // Gemini authenticates via a query parameter rather than a header.
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.config.api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), error_text));
        }

        let raw: Value = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let parsed: GeminiResponse = serde_json::from_value(raw.clone())?;
        self.convert_response(parsed, raw)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parts_join() {
        let client = GeminiClient::new("test-key", "gemini-1.5-pro");
        let raw = json!({
            "candidates": [{"content": {"parts": [{"text": "Hel"}, {"text": "lo"}]}}],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 1}
        });
        let parsed: GeminiResponse = serde_json::from_value(raw.clone()).unwrap();

        let response = client.convert_response(parsed, raw).unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(response.model, "gemini-1.5-pro");
        assert_eq!(response.input_tokens, 5);
    }
}
