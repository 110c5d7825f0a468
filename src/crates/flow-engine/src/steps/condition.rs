//! CONDITION step: evaluate a comparison, producing a boolean output.
//!
//! A false result is a successful step; it only matters to steps gated on
//! this one. Never retried.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use flow_core::{RunContext, Step, StepConfig, StepResult, StepType};

use crate::steps::{config_mismatch, ops, ExecEnv, StepExecutor};

pub struct ConditionExecutor;

#[async_trait]
impl StepExecutor for ConditionExecutor {
    fn step_type(&self) -> StepType {
        StepType::Condition
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        _env: &ExecEnv,
        _cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Condition(config) = &step.config else {
            return config_mismatch(step, StepType::Condition);
        };

        match ops::evaluate(&config.field, config.operator, &config.value, ctx, step.order) {
            Ok(outcome) => StepResult::succeeded(&step.id, Value::Bool(outcome)),
            Err(e) => StepResult::failed(&step.id, e.to_string()),
        }
    }
}
