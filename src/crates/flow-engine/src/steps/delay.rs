//! DELAY step: suspend this execution's continuation without blocking
//! anything else.

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use flow_core::{RunContext, Step, StepConfig, StepResult, StepType};

use crate::steps::{config_mismatch, ExecEnv, StepExecutor};

pub struct DelayExecutor;

#[async_trait]
impl StepExecutor for DelayExecutor {
    fn step_type(&self) -> StepType {
        StepType::Delay
    }

    async fn execute(
        &self,
        step: &Step,
        _ctx: &RunContext,
        _env: &ExecEnv,
        cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Delay(config) = &step.config else {
            return config_mismatch(step, StepType::Delay);
        };

        let duration = config.as_duration();
        debug!(step_id = %step.id, delay_ms = duration.as_millis() as u64, "delaying");

        tokio::select! {
            _ = cancel.cancelled() => StepResult::cancelled(&step.id),
            _ = tokio::time::sleep(duration) => StepResult::succeeded(
                &step.id,
                json!({"delayed_ms": duration.as_millis() as u64}),
            ),
        }
    }
}
