//! Step definitions: the closed set of typed units of work in a workflow.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::model::routing::{ModelRoutingConfig, ModelSpec};

/// A single typed unit of work within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    pub workflow_id: String,

    /// Position within the workflow. Unique per workflow (ties rejected at
    /// validation time); strictly increasing, gaps allowed.
    pub order: u32,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub config: StepConfig,

    /// Optional gate on a prior CONDITION or DECISION step. When the gate
    /// does not match, the runner marks this step SKIPPED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<StepGate>,
}

impl Step {
    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }
}

/// Discriminant of a step's config variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Prompt,
    Condition,
    Transform,
    Delay,
    Webhook,
    Decision,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Prompt => "PROMPT",
            Self::Condition => "CONDITION",
            Self::Transform => "TRANSFORM",
            Self::Delay => "DELAY",
            Self::Webhook => "WEBHOOK",
            Self::Decision => "DECISION",
        };
        f.write_str(s)
    }
}

/// Step configuration, a closed union keyed by `type`. Validated once at the
/// config boundary, never inspected ad hoc downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepConfig {
    Prompt(PromptConfig),
    Condition(ConditionConfig),
    Transform(TransformConfig),
    Delay(DelayConfig),
    Webhook(WebhookStepConfig),
    Decision(DecisionConfig),
}

impl StepConfig {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::Prompt(_) => StepType::Prompt,
            Self::Condition(_) => StepType::Condition,
            Self::Transform(_) => StepType::Transform,
            Self::Delay(_) => StepType::Delay,
            Self::Webhook(_) => StepType::Webhook,
            Self::Decision(_) => StepType::Decision,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Prompt text; may contain `{{…}}` binding tokens.
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Extra variables resolved against the run context and overlaid on the
    /// workflow variables while resolving `prompt`.
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    pub models: Vec<ModelSpec>,

    #[serde(default)]
    pub routing: ModelRoutingConfig,
}

/// Comparison operators shared by CONDITION steps and DECISION rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    StartsWith,
    EndsWith,
    Exists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Left operand; may be a binding token.
    pub field: String,

    pub operator: CompareOp,

    /// Right operand; may contain binding tokens. Ignored by `exists`.
    #[serde(default)]
    pub value: Value,
}

/// Closed whitelist of transform operations. Each is a pure deterministic
/// function; no user-supplied code is ever executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Uppercase,
    Lowercase,
    Trim,
    /// Substitute the resolved input into `{{input}}` and resolve any other
    /// binding tokens in the template.
    Template { template: String },
    JsonParse,
    JsonStringify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Input expression; may be a binding token.
    pub input: String,

    #[serde(flatten)]
    pub operation: TransformOp,

    /// Field name the transformed value is written to in the step output.
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Milliseconds,
    Seconds,
    Minutes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    pub duration: u64,
    pub unit: DelayUnit,
}

impl DelayConfig {
    pub fn as_duration(&self) -> Duration {
        match self.unit {
            DelayUnit::Milliseconds => Duration::from_millis(self.duration),
            DelayUnit::Seconds => Duration::from_secs(self.duration),
            DelayUnit::Minutes => Duration::from_secs(self.duration * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookStepConfig {
    /// Target URL; may contain binding tokens.
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Header values may contain binding tokens.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request body, resolved against the run context before sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Per-attempt timeout.
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt, applied to transient failures only.
    #[serde(default = "default_webhook_retries")]
    pub retries: u32,
}

impl WebhookStepConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRule {
    /// Left operand; may be a binding token.
    pub field: String,

    pub operator: CompareOp,

    #[serde(default)]
    pub value: Value,

    /// Branch key returned when this rule matches.
    pub choice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Evaluated in order; the first matching rule wins.
    pub rules: Vec<DecisionRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_choice: Option<String>,
}

/// Declares that a step only runs when a prior CONDITION or DECISION step
/// produced the expected output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGate {
    /// The gating CONDITION or DECISION step.
    pub step_id: String,

    pub expected: GateExpectation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateExpectation {
    /// Matches a CONDITION step's boolean output.
    Bool(bool),
    /// Matches a DECISION step's branch key.
    Choice(String),
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

fn default_webhook_retries() -> u32 {
    2
}
