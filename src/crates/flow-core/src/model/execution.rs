//! Execution records: the immutable outcome of one workflow run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-step state machine: PENDING → RUNNING → terminal. SKIPPED is only
/// reachable via CONDITION/DECISION gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

/// One model's outcome within a PROMPT step, including the attempt trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub model_id: String,

    pub provider: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,

    /// True only for stubbed responses; real provider round-trips set false.
    pub simulated: bool,

    /// Attempts consumed, including the successful one if any.
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub input_tokens: u64,

    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,

    pub status: StepStatus,

    #[serde(default)]
    pub output: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Populated for PROMPT steps only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_results: Vec<ProviderResult>,
}

impl StepResult {
    pub fn succeeded(step_id: impl Into<String>, output: Value) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Succeeded,
            output,
            error: None,
            provider_results: Vec::new(),
        }
    }

    pub fn failed(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            output: Value::Null,
            error: Some(error.into()),
            provider_results: Vec::new(),
        }
    }

    pub fn skipped(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Skipped,
            output: Value::Null,
            error: None,
            provider_results: Vec::new(),
        }
    }

    pub fn cancelled(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Cancelled,
            output: Value::Null,
            error: None,
            provider_results: Vec::new(),
        }
    }

    pub fn with_provider_results(mut self, results: Vec<ProviderResult>) -> Self {
        self.provider_results = results;
        self
    }

    /// Tokens consumed across this step's provider calls.
    pub fn tokens_used(&self) -> u64 {
        self.provider_results
            .iter()
            .map(|r| r.input_tokens + r.output_tokens)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub tokens_used: u64,
    pub duration_ms: u64,
}

/// Record of one workflow run. Created at run start, finalized at run end,
/// immutable once terminal. Preview runs are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,

    pub workflow_id: String,

    /// None for manual and preview runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,

    pub status: ExecutionStatus,

    pub step_results: Vec<StepResult>,

    #[serde(default)]
    pub stats: ExecutionStats,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: impl Into<String>, trigger_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            trigger_id,
            status: ExecutionStatus::Running,
            step_results: Vec::new(),
            stats: ExecutionStats::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }
}
