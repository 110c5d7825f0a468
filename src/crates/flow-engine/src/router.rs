//! Model routing for PROMPT steps.
//!
//! Fans a single resolved prompt out to one or more providers under the
//! step's routing policy: fallback (try in preference order until one
//! succeeds) or bounded-parallel (a semaphore caps in-flight calls). Every
//! attempt, successful or not, lands in the provider-result trail.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use flow_core::{ErrorPolicy, FlowError, ModelRoutingConfig, ModelSpec, ProviderResult, RoutingMode};
use llm::{CompletionProvider, CompletionRequest, CompletionResponse, LlmError, ProviderFactory};

use crate::retry::with_retry;

/// The prompt handed to every routed model.
#[derive(Debug, Clone)]
pub struct PromptPayload {
    pub prompt: String,
    pub system: Option<String>,
}

/// Successful routing outcome.
#[derive(Debug)]
pub struct RoutedOutput {
    /// Winning model's text.
    pub text: String,
    /// Spec id of the winning model.
    pub model_id: String,
    /// Per-model attempt trail, in routing order.
    pub provider_results: Vec<ProviderResult>,
}

/// Failed routing outcome. The attempt trail survives so the step result
/// can record every failure even though the step fails.
#[derive(Debug)]
pub struct RouteError {
    pub error: FlowError,
    pub provider_results: Vec<ProviderResult>,
}

pub struct ModelRouter {
    factory: Arc<dyn ProviderFactory>,
}

impl ModelRouter {
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self { factory }
    }

    /// Route `payload` over `models` per `routing`. `step_id` labels errors
    /// and logs only.
    pub async fn route(
        &self,
        user_id: &str,
        step_id: &str,
        models: &[ModelSpec],
        routing: &ModelRoutingConfig,
        payload: &PromptPayload,
        cancel: &CancellationToken,
    ) -> Result<RoutedOutput, RouteError> {
        let ordered = routing_order(models, routing);
        if ordered.is_empty() {
            return Err(RouteError {
                error: FlowError::validation(format!("step '{}': no enabled models to route", step_id)),
                provider_results: Vec::new(),
            });
        }

        match routing.mode {
            RoutingMode::Fallback => self.route_fallback(user_id, step_id, &ordered, payload, cancel).await,
            RoutingMode::Parallel => {
                self.route_parallel(user_id, step_id, &ordered, routing, payload, cancel).await
            }
        }
    }

    async fn route_fallback(
        &self,
        user_id: &str,
        step_id: &str,
        ordered: &[&ModelSpec],
        payload: &PromptPayload,
        cancel: &CancellationToken,
    ) -> Result<RoutedOutput, RouteError> {
        let mut results: Vec<ProviderResult> = Vec::new();

        for spec in ordered {
            if cancel.is_cancelled() {
                return Err(RouteError { error: FlowError::Cancelled, provider_results: results });
            }

            // Credential and unknown-provider failures are fatal to the
            // step, not a per-model miss to fall past.
            let provider = match self.factory.provider_for(user_id, spec).await {
                Ok(provider) => provider,
                Err(e) => {
                    return Err(RouteError { error: e.into(), provider_results: results });
                }
            };

            debug!(step_id = %step_id, model_id = %spec.id, "dispatching model");
            let (outcome, attempts) = call_model(provider.clone(), spec, payload, cancel).await;
            let simulated = provider.simulated();

            match outcome {
                Ok(response) => {
                    let text = response.text.clone();
                    results.push(success_result(spec, response, simulated, attempts));
                    return Ok(RoutedOutput {
                        text,
                        model_id: spec.id.clone(),
                        provider_results: results,
                    });
                }
                Err(e) => {
                    warn!(step_id = %step_id, model_id = %spec.id, error = %e, "model failed, falling back");
                    results.push(failure_result(spec, &e, simulated, attempts));
                }
            }
        }

        Err(RouteError {
            error: FlowError::AllProvidersFailed {
                step_id: step_id.to_string(),
                attempted: results.len(),
            },
            provider_results: results,
        })
    }

    async fn route_parallel(
        &self,
        user_id: &str,
        step_id: &str,
        ordered: &[&ModelSpec],
        routing: &ModelRoutingConfig,
        payload: &PromptPayload,
        cancel: &CancellationToken,
    ) -> Result<RoutedOutput, RouteError> {
        // Resolve all providers before launching anything so a missing
        // credential fails deterministically.
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::with_capacity(ordered.len());
        for spec in ordered {
            match self.factory.provider_for(user_id, spec).await {
                Ok(provider) => providers.push(provider),
                Err(e) => {
                    return Err(RouteError { error: e.into(), provider_results: Vec::new() });
                }
            }
        }

        let concurrency = routing.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let child = cancel.child_token();
        let fail_fast = routing.on_error == ErrorPolicy::FailFast;
        let payload = Arc::new(payload.clone());

        let mut handles = Vec::with_capacity(ordered.len());
        for (idx, (spec, provider)) in ordered.iter().map(|s| (*s).clone()).zip(providers).enumerate() {
            let semaphore = semaphore.clone();
            let child = child.clone();
            let payload = payload.clone();
            let step_id = step_id.to_string();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("routing semaphore closed");

                // A sibling already failed under fail-fast; don't dispatch.
                if child.is_cancelled() {
                    return (idx, aborted_result(&spec));
                }

                debug!(step_id = %step_id, model_id = %spec.id, "dispatching model");
                let (outcome, attempts) = call_model(provider.clone(), &spec, &payload, &child).await;
                let simulated = provider.simulated();

                let result = match outcome {
                    Ok(response) => success_result(&spec, response, simulated, attempts),
                    Err(e) => {
                        warn!(step_id = %step_id, model_id = %spec.id, error = %e, "model failed");
                        if fail_fast {
                            child.cancel();
                        }
                        failure_result(&spec, &e, simulated, attempts)
                    }
                };
                (idx, result)
            }));
        }

        let mut settled: Vec<(usize, ProviderResult)> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("routing task panicked"))
            .collect();
        settled.sort_by_key(|(idx, _)| *idx);
        let results: Vec<ProviderResult> = settled.into_iter().map(|(_, r)| r).collect();

        if fail_fast {
            if let Some(failed) = results.iter().find(|r| !r.success && r.attempts > 0) {
                return Err(RouteError {
                    error: FlowError::Provider(format!(
                        "model '{}' failed under fail-fast policy: {}",
                        failed.model_id,
                        failed.error.as_deref().unwrap_or("unknown error")
                    )),
                    provider_results: results,
                });
            }
        }

        match results.iter().find(|r| r.success) {
            Some(winner) => Ok(RoutedOutput {
                text: winner.output_text.clone().unwrap_or_default(),
                model_id: winner.model_id.clone(),
                provider_results: results,
            }),
            None if cancel.is_cancelled() => {
                Err(RouteError { error: FlowError::Cancelled, provider_results: results })
            }
            None => Err(RouteError {
                error: FlowError::AllProvidersFailed {
                    step_id: step_id.to_string(),
                    attempted: results.len(),
                },
                provider_results: results,
            }),
        }
    }
}

/// Enabled models in routing order: preferred ids first, then the rest in
/// declaration order.
fn routing_order<'a>(models: &'a [ModelSpec], routing: &ModelRoutingConfig) -> Vec<&'a ModelSpec> {
    let mut ordered: Vec<&ModelSpec> = Vec::with_capacity(models.len());
    for id in &routing.preferred_order {
        if let Some(spec) = models.iter().find(|m| &m.id == id && m.enabled) {
            ordered.push(spec);
        }
    }
    for spec in models.iter().filter(|m| m.enabled) {
        if !ordered.iter().any(|s| s.id == spec.id) {
            ordered.push(spec);
        }
    }
    ordered
}

/// One model's call under its own retry policy and per-call timeout.
async fn call_model(
    provider: Arc<dyn CompletionProvider>,
    spec: &ModelSpec,
    payload: &PromptPayload,
    cancel: &CancellationToken,
) -> (llm::Result<CompletionResponse>, u32) {
    let request = CompletionRequest {
        prompt: payload.prompt.clone(),
        system: payload.system.clone(),
        temperature: spec.params.temperature,
        max_tokens: spec.params.max_tokens,
    };
    let timeout = Duration::from_millis(spec.timeout_ms);
    let timeout_ms = spec.timeout_ms;

    with_retry(&spec.retry, &spec.id, cancel, || {
        let provider = provider.clone();
        let request = request.clone();
        async move {
            match tokio::time::timeout(timeout, provider.complete(request)).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout { millis: timeout_ms }),
            }
        }
    })
    .await
}

fn success_result(
    spec: &ModelSpec,
    response: CompletionResponse,
    simulated: bool,
    attempts: u32,
) -> ProviderResult {
    ProviderResult {
        model_id: spec.id.clone(),
        provider: spec.provider.clone(),
        success: true,
        output_text: Some(response.text),
        raw: Some(response.raw),
        simulated,
        attempts,
        error: None,
        input_tokens: response.input_tokens,
        output_tokens: response.output_tokens,
    }
}

fn failure_result(spec: &ModelSpec, error: &LlmError, simulated: bool, attempts: u32) -> ProviderResult {
    ProviderResult {
        model_id: spec.id.clone(),
        provider: spec.provider.clone(),
        success: false,
        output_text: None,
        raw: None,
        simulated,
        attempts,
        error: Some(error.to_string()),
        input_tokens: 0,
        output_tokens: 0,
    }
}

/// Placeholder for a model that was never dispatched because a fail-fast
/// sibling cancelled the step.
fn aborted_result(spec: &ModelSpec) -> ProviderResult {
    ProviderResult {
        model_id: spec.id.clone(),
        provider: spec.provider.clone(),
        success: false,
        output_text: None,
        raw: None,
        simulated: false,
        attempts: 0,
        error: Some("cancelled before dispatch".to_string()),
        input_tokens: 0,
        output_tokens: 0,
    }
}
