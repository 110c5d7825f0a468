//! PROMPT step: resolve the prompt and route it over the model set.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use flow_core::{resolver, FlowError, RunContext, Step, StepConfig, StepResult, StepType};
use serde_json::Value;

use crate::router::PromptPayload;
use crate::steps::{config_mismatch, ExecEnv, StepExecutor};

pub struct PromptExecutor;

#[async_trait]
impl StepExecutor for PromptExecutor {
    fn step_type(&self) -> StepType {
        StepType::Prompt
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        env: &ExecEnv,
        cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Prompt(config) = &step.config else {
            return config_mismatch(step, StepType::Prompt);
        };

        // Declared variables resolve first, then overlay the workflow
        // variables while the prompt itself resolves.
        let scoped;
        let ctx = if config.variables.is_empty() {
            ctx
        } else {
            let mut resolved = HashMap::with_capacity(config.variables.len());
            for (name, value) in &config.variables {
                match resolver::resolve(value, ctx, Some(step.order)) {
                    Ok(v) => {
                        resolved.insert(name.clone(), v);
                    }
                    Err(e) => return StepResult::failed(&step.id, e.to_string()),
                }
            }
            scoped = ctx.overlay_variables(resolved);
            &scoped
        };

        let prompt = match resolver::resolve_str(&config.prompt, ctx, Some(step.order)) {
            Ok(v) => resolver::stringify(&v),
            Err(e) => return StepResult::failed(&step.id, e.to_string()),
        };

        let system = match &config.system {
            Some(template) => match resolver::resolve_str(template, ctx, Some(step.order)) {
                Ok(v) => Some(resolver::stringify(&v)),
                Err(e) => return StepResult::failed(&step.id, e.to_string()),
            },
            None => None,
        };

        let payload = PromptPayload { prompt, system };
        match env
            .router
            .route(&env.user_id, &step.id, &config.models, &config.routing, &payload, cancel)
            .await
        {
            Ok(routed) => StepResult::succeeded(&step.id, Value::String(routed.text))
                .with_provider_results(routed.provider_results),
            Err(route_err) => {
                let result = if matches!(route_err.error, FlowError::Cancelled) {
                    StepResult::cancelled(&step.id)
                } else {
                    StepResult::failed(&step.id, route_err.error.to_string())
                };
                result.with_provider_results(route_err.provider_results)
            }
        }
    }
}
