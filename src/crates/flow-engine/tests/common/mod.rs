//! Shared test fixtures: scripted providers with observable call behavior.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flow_core::{ModelSpec, RetryPolicy};
use llm::{CompletionProvider, CompletionRequest, CompletionResponse, LlmError, ProviderFactory};

/// Scripted behaviors for a fake provider.
pub enum Script {
    /// Succeed with fixed text after an optional delay.
    Succeed { text: String, delay: Duration },
    /// Succeed by echoing the prompt.
    Echo,
    /// Always fail with a retryable 503-style error.
    FailRetryable,
    /// Always fail with a non-retryable auth error.
    FailAuth,
    /// Fail `failures` times with retryable errors, then succeed.
    FailThenSucceed { failures: usize, text: String },
}

/// Tracks the high-water mark of simultaneous in-flight calls.
#[derive(Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct ScriptedProvider {
    name: String,
    script: Script,
    calls: AtomicUsize,
    gauge: Arc<InFlightGauge>,
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn simulated(&self) -> bool {
        true
    }

    async fn complete(&self, request: CompletionRequest) -> llm::Result<CompletionResponse> {
        self.gauge.enter();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match &self.script {
            Script::Succeed { text, delay } => {
                tokio::time::sleep(*delay).await;
                Ok(response(text, &self.name))
            }
            Script::Echo => Ok(response(&format!("echo:{}", request.prompt), &self.name)),
            Script::FailRetryable => Err(LlmError::ServiceUnavailable("scripted 503".to_string())),
            Script::FailAuth => Err(LlmError::Authentication("scripted 403".to_string())),
            Script::FailThenSucceed { failures, text } => {
                if call <= *failures {
                    Err(LlmError::ServiceUnavailable(format!("scripted failure {}", call)))
                } else {
                    Ok(response(text, &self.name))
                }
            }
        };

        self.gauge.exit();
        result
    }
}

fn response(text: &str, model: &str) -> CompletionResponse {
    CompletionResponse {
        text: text.to_string(),
        model: model.to_string(),
        input_tokens: 10,
        output_tokens: 5,
        raw: json!({"scripted": true}),
    }
}

/// Provider factory keyed by model spec id. Specs without a script resolve
/// to a missing-credential error, mirroring the production factory.
#[derive(Default)]
pub struct ScriptedFactory {
    providers: Mutex<HashMap<String, Arc<ScriptedProvider>>>,
    pub gauge: Arc<InFlightGauge>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, model_id: &str, script: Script) {
        let provider = Arc::new(ScriptedProvider {
            name: model_id.to_string(),
            script,
            calls: AtomicUsize::new(0),
            gauge: self.gauge.clone(),
        });
        self.providers.lock().insert(model_id.to_string(), provider);
    }

    /// Total completed calls against a model, across retries.
    pub fn calls(&self, model_id: &str) -> usize {
        self.providers
            .lock()
            .get(model_id)
            .map(|p| p.calls.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProviderFactory for ScriptedFactory {
    async fn provider_for(
        &self,
        _user_id: &str,
        spec: &ModelSpec,
    ) -> llm::Result<Arc<dyn CompletionProvider>> {
        self.providers
            .lock()
            .get(&spec.id)
            .cloned()
            .map(|p| p as Arc<dyn CompletionProvider>)
            .ok_or_else(|| LlmError::MissingCredential { provider: spec.provider.clone() })
    }
}

/// A model spec with zero backoff so retry-heavy tests stay fast.
pub fn fast_spec(id: &str) -> ModelSpec {
    let mut spec = ModelSpec::new(id, "scripted", "test-model");
    spec.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 0,
        max_backoff_ms: 0,
        multiplier: 2.0,
    };
    spec
}
