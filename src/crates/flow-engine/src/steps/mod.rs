//! Step executors, one per step type.
//!
//! Each executor implements the same contract: resolve its config against
//! the run context, do its work, and report a [`StepResult`]. Failure policy
//! is per type; the runner decides what a failure means for the run.

mod condition;
mod decision;
mod delay;
mod ops;
mod prompt;
mod transform;
mod webhook;

pub use condition::ConditionExecutor;
pub use decision::DecisionExecutor;
pub use delay::DelayExecutor;
pub use prompt::PromptExecutor;
pub use transform::TransformExecutor;
pub use webhook::WebhookExecutor;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use flow_core::{RunContext, Step, StepResult, StepType};

use crate::router::ModelRouter;

/// Shared services handed to every executor.
#[derive(Clone)]
pub struct ExecEnv {
    pub router: Arc<ModelRouter>,
    pub http: reqwest::Client,
    /// Credential-lookup key for provider calls.
    pub user_id: String,
}

/// Polymorphic step contract.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    fn step_type(&self) -> StepType;

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        env: &ExecEnv,
        cancel: &CancellationToken,
    ) -> StepResult;
}

/// Dispatch table over the closed step-type union.
pub fn executor_for(step_type: StepType) -> &'static dyn StepExecutor {
    match step_type {
        StepType::Prompt => &PromptExecutor,
        StepType::Condition => &ConditionExecutor,
        StepType::Transform => &TransformExecutor,
        StepType::Delay => &DelayExecutor,
        StepType::Webhook => &WebhookExecutor,
        StepType::Decision => &DecisionExecutor,
    }
}

/// Config/executor mismatches mean dispatch itself is broken; surface them
/// as step failures rather than panicking mid-run.
pub(crate) fn config_mismatch(step: &Step, expected: StepType) -> StepResult {
    StepResult::failed(
        &step.id,
        format!("step config is not {} (got {})", expected, step.step_type()),
    )
}
