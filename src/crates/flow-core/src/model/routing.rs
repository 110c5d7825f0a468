//! Model specs and routing policy for PROMPT steps.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single model a PROMPT step may be routed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Identifier referenced by `ModelRoutingConfig::preferred_order`.
    pub id: String,

    /// Provider name, e.g. "anthropic", "openai", "google", "simulated".
    pub provider: String,

    /// Provider-side model identifier, e.g. "claude-3-5-sonnet-latest".
    pub model: String,

    /// Human-readable label for logs and results.
    #[serde(default)]
    pub label: String,

    /// Disabled models are never dispatched.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub params: ModelParams,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-call timeout; a timed-out call counts as a failed attempt.
    #[serde(default = "default_call_timeout_ms")]
    pub timeout_ms: u64,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            model: model.into(),
            label: String::new(),
            enabled: true,
            params: ModelParams::default(),
            retry: RetryPolicy::default(),
            timeout_ms: default_call_timeout_ms(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-model sampling parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Bounded-attempt exponential backoff policy for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-indexed), capped at
    /// `max_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let millis = (self.initial_backoff_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped = millis.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// How a PROMPT step fans out over its model set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Try models in preferred order until one succeeds.
    #[default]
    Fallback,
    /// Run models concurrently up to the concurrency bound.
    Parallel,
}

/// Failure policy for parallel routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// The step succeeds if at least one model succeeds.
    #[default]
    Continue,
    /// Any exhausted model fails the step and cancels in-flight siblings.
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoutingConfig {
    #[serde(default)]
    pub mode: RoutingMode,

    /// Maximum in-flight provider calls in parallel mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Model ids in routing preference order. Models not listed are routed
    /// after the listed ones, in declaration order.
    #[serde(default)]
    pub preferred_order: Vec<String>,

    #[serde(default)]
    pub on_error: ErrorPolicy,
}

impl Default for ModelRoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            concurrency: default_concurrency(),
            preferred_order: Vec::new(),
            on_error: ErrorPolicy::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_concurrency() -> usize {
    2
}
