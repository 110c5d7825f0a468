//! DECISION step: pick a branch key from an ordered rule list.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use flow_core::{FlowError, RunContext, Step, StepConfig, StepResult, StepType};

use crate::steps::{config_mismatch, ops, ExecEnv, StepExecutor};

pub struct DecisionExecutor;

#[async_trait]
impl StepExecutor for DecisionExecutor {
    fn step_type(&self) -> StepType {
        StepType::Decision
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        _env: &ExecEnv,
        _cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Decision(config) = &step.config else {
            return config_mismatch(step, StepType::Decision);
        };

        for (idx, rule) in config.rules.iter().enumerate() {
            match ops::evaluate(&rule.field, rule.operator, &rule.value, ctx, step.order) {
                Ok(true) => {
                    debug!(step_id = %step.id, rule = idx, choice = %rule.choice, "rule matched");
                    return StepResult::succeeded(&step.id, Value::String(rule.choice.clone()));
                }
                Ok(false) => continue,
                Err(e) => return StepResult::failed(&step.id, e.to_string()),
            }
        }

        match &config.default_choice {
            Some(choice) => {
                debug!(step_id = %step.id, choice = %choice, "no rule matched, using default");
                StepResult::succeeded(&step.id, Value::String(choice.clone()))
            }
            None => StepResult::failed(
                &step.id,
                FlowError::UnresolvedDecision { step_id: step.id.clone() }.to_string(),
            ),
        }
    }
}
