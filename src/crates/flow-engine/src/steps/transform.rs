//! TRANSFORM step: apply a whitelisted pure operation to a resolved input.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use flow_core::{resolver, RunContext, Step, StepConfig, StepResult, StepType, TransformOp};

use crate::steps::{config_mismatch, ExecEnv, StepExecutor};

pub struct TransformExecutor;

#[async_trait]
impl StepExecutor for TransformExecutor {
    fn step_type(&self) -> StepType {
        StepType::Transform
    }

    async fn execute(
        &self,
        step: &Step,
        ctx: &RunContext,
        _env: &ExecEnv,
        _cancel: &CancellationToken,
    ) -> StepResult {
        let StepConfig::Transform(config) = &step.config else {
            return config_mismatch(step, StepType::Transform);
        };

        let input = match resolver::resolve_str(&config.input, ctx, Some(step.order)) {
            Ok(v) => v,
            Err(e) => return StepResult::failed(&step.id, e.to_string()),
        };

        let transformed = match apply(&config.operation, &input, ctx, step.order) {
            Ok(v) => v,
            Err(message) => return StepResult::failed(&step.id, message),
        };

        let mut output = Map::new();
        output.insert(config.output.clone(), transformed);
        StepResult::succeeded(&step.id, Value::Object(output))
    }
}

fn apply(
    operation: &TransformOp,
    input: &Value,
    ctx: &RunContext,
    order: u32,
) -> Result<Value, String> {
    match operation {
        TransformOp::Uppercase => Ok(Value::String(resolver::stringify(input).to_uppercase())),
        TransformOp::Lowercase => Ok(Value::String(resolver::stringify(input).to_lowercase())),
        TransformOp::Trim => Ok(Value::String(resolver::stringify(input).trim().to_string())),
        TransformOp::Template { template } => {
            // `{{input}}` is local to the template; substitute it before
            // the resolver sees the string, then resolve context tokens.
            let rendered = resolver::stringify(input);
            let filled = template
                .replace("{{input}}", &rendered)
                .replace("{{ input }}", &rendered);
            resolver::resolve_str(&filled, ctx, Some(order)).map_err(|e| e.to_string())
        }
        TransformOp::JsonParse => match input {
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| format!("json_parse failed: {}", e))
            }
            other => Err(format!(
                "json_parse needs a string input, got {}",
                resolver::stringify(other)
            )),
        },
        TransformOp::JsonStringify => Ok(Value::String(input.to_string())),
    }
}
