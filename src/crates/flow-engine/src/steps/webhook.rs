//! WEBHOOK step: outbound HTTP request with bounded retries.
//!
//! Transport failures and 5xx responses are transient and retried with
//! backoff; other non-2xx responses fail immediately. A non-2xx outcome
//! after retries are exhausted is fatal to the step.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use flow_core::{resolver, HttpMethod, RetryPolicy, RunContext, Step, StepConfig, StepResult, StepType};

use crate::retry::{with_retry, Retryable};
use crate::steps::{config_mismatch, ExecEnv, StepExecutor};

#[derive(Debug, Error)]
enum CallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl Retryable for CallError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => (500..600).contains(status),
        }
    }
}

pub struct WebhookExecutor;

#[async_trait]
impl StepExecutor for WebhookExecutor {
    fn step_type(&self) -> StepType {
        StepType::Webhook
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        env: &ExecEnv,
        cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Webhook(config) = &step.config else {
            return config_mismatch(step, StepType::Webhook);
        };

        let url = match resolver::resolve_str(&config.url, ctx, Some(step.order)) {
            Ok(v) => resolver::stringify(&v),
            Err(e) => return StepResult::failed(&step.id, e.to_string()),
        };

        let mut headers: HashMap<String, String> = HashMap::with_capacity(config.headers.len());
        for (name, template) in &config.headers {
            match resolver::resolve_str(template, ctx, Some(step.order)) {
                Ok(v) => {
                    headers.insert(name.clone(), resolver::stringify(&v));
                }
                Err(e) => return StepResult::failed(&step.id, e.to_string()),
            }
        }

        let body = match &config.body {
            Some(template) => match resolver::resolve(template, ctx, Some(step.order)) {
                Ok(v) => Some(v),
                Err(e) => return StepResult::failed(&step.id, e.to_string()),
            },
            None => None,
        };

        let policy = RetryPolicy {
            max_attempts: config.retries + 1,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            multiplier: 2.0,
        };
        let timeout = config.attempt_timeout();
        let timeout_ms = config.timeout_ms;
        let method = reqwest_method(config.method);

        let (outcome, attempts) = with_retry(&policy, &step.id, cancel, || {
            let client = env.http.clone();
            let method = method.clone();
            let url = url.clone();
            let headers = headers.clone();
            let body = body.clone();
            async move {
                let mut request = client.request(method, &url);
                for (name, value) in &headers {
                    request = request.header(name.as_str(), value.as_str());
                }
                if let Some(body) = &body {
                    request = request.json(body);
                }

                let response = match tokio::time::timeout(timeout, request.send()).await {
                    Ok(result) => result.map_err(CallError::Transport)?,
                    Err(_) => return Err(CallError::Timeout { millis: timeout_ms }),
                };

                let status = response.status().as_u16();
                let text = response.text().await.map_err(CallError::Transport)?;
                if (200..300).contains(&status) {
                    let parsed = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
                    Ok((status, parsed))
                } else {
                    Err(CallError::Status { status, body: text })
                }
            }
        })
        .await;

        match outcome {
            Ok((status, body)) => StepResult::succeeded(
                &step.id,
                json!({"status": status, "body": body, "attempts": attempts}),
            ),
            Err(e) => StepResult::failed(&step.id, e.to_string()),
        }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}
