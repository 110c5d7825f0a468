//! Fail-fast structural validation of workflow configuration.
//!
//! Every check here runs before any step executes; a workflow that passes
//! can still fail at run time (unresolvable tokens, provider errors), but
//! malformed config never gets partway through a run.

use std::collections::HashMap;

use crate::error::{FlowError, Result};
use crate::model::{
    DecisionConfig, PromptConfig, RoutingMode, Step, StepConfig, TransformConfig, TransformOp,
    WebhookStepConfig, Workflow,
};

/// Validate a workflow and all of its step configs.
pub fn validate_workflow(workflow: &Workflow) -> Result<()> {
    let mut orders: HashMap<u32, &str> = HashMap::new();
    for step in &workflow.steps {
        if let Some(existing) = orders.insert(step.order, &step.id) {
            return Err(FlowError::validation(format!(
                "steps '{}' and '{}' share order {}",
                existing, step.id, step.order
            )));
        }
    }

    let step_orders: HashMap<&str, u32> =
        workflow.steps.iter().map(|s| (s.id.as_str(), s.order)).collect();

    for step in &workflow.steps {
        validate_step(step, &step_orders)?;
    }

    Ok(())
}

fn validate_step(step: &Step, step_orders: &HashMap<&str, u32>) -> Result<()> {
    let fail = |msg: String| -> Result<()> {
        Err(FlowError::validation(format!("step '{}': {}", step.id, msg)))
    };

    if let Some(gate) = &step.gate {
        match step_orders.get(gate.step_id.as_str()) {
            None => return fail(format!("gate references unknown step '{}'", gate.step_id)),
            Some(&gate_order) if gate_order >= step.order => {
                return fail(format!(
                    "gate references step '{}' at order {}, which is not prior to order {}",
                    gate.step_id, gate_order, step.order
                ));
            }
            Some(_) => {}
        }
    }

    match &step.config {
        StepConfig::Prompt(config) => validate_prompt(step, config),
        StepConfig::Condition(config) => {
            if config.field.trim().is_empty() {
                return fail("condition field is empty".to_string());
            }
            Ok(())
        }
        StepConfig::Transform(config) => validate_transform(step, config),
        StepConfig::Delay(config) => {
            if config.duration == 0 {
                return fail("delay duration must be greater than zero".to_string());
            }
            Ok(())
        }
        StepConfig::Webhook(config) => validate_webhook(step, config),
        StepConfig::Decision(config) => validate_decision(step, config),
    }
}

fn validate_prompt(step: &Step, config: &PromptConfig) -> Result<()> {
    let fail = |msg: String| -> Result<()> {
        Err(FlowError::validation(format!("step '{}': {}", step.id, msg)))
    };

    if config.prompt.trim().is_empty() {
        return fail("prompt is empty".to_string());
    }
    if config.models.is_empty() {
        return fail("no models configured".to_string());
    }
    if !config.models.iter().any(|m| m.enabled) {
        return fail("no enabled models".to_string());
    }
    if config.routing.mode == RoutingMode::Parallel && config.routing.concurrency == 0 {
        return fail("parallel routing requires concurrency of at least 1".to_string());
    }

    for model in &config.models {
        if model.retry.max_attempts == 0 {
            return fail(format!("model '{}': max_attempts must be at least 1", model.id));
        }
        if model.timeout_ms == 0 {
            return fail(format!("model '{}': timeout_ms must be greater than zero", model.id));
        }
    }

    for id in &config.routing.preferred_order {
        if !config.models.iter().any(|m| &m.id == id) {
            return fail(format!("preferred_order references unknown model '{}'", id));
        }
    }

    Ok(())
}

fn validate_transform(step: &Step, config: &TransformConfig) -> Result<()> {
    let fail = |msg: &str| -> Result<()> {
        Err(FlowError::validation(format!("step '{}': {}", step.id, msg)))
    };

    if config.input.trim().is_empty() {
        return fail("transform input is empty");
    }
    if config.output.trim().is_empty() {
        return fail("transform output field is empty");
    }
    if let TransformOp::Template { template } = &config.operation {
        if template.trim().is_empty() {
            return fail("transform template is empty");
        }
    }
    Ok(())
}

fn validate_webhook(step: &Step, config: &WebhookStepConfig) -> Result<()> {
    let fail = |msg: &str| -> Result<()> {
        Err(FlowError::validation(format!("step '{}': {}", step.id, msg)))
    };

    if !(config.url.starts_with("http://") || config.url.starts_with("https://")) {
        return fail("webhook url must be http(s)");
    }
    if config.timeout_ms == 0 {
        return fail("webhook timeout_ms must be greater than zero");
    }
    Ok(())
}

fn validate_decision(step: &Step, config: &DecisionConfig) -> Result<()> {
    let fail = |msg: String| -> Result<()> {
        Err(FlowError::validation(format!("step '{}': {}", step.id, msg)))
    };

    if config.rules.is_empty() && config.default_choice.is_none() {
        return fail("decision has no rules and no default choice".to_string());
    }
    for (idx, rule) in config.rules.iter().enumerate() {
        if rule.field.trim().is_empty() {
            return fail(format!("decision rule {} has an empty field", idx));
        }
        if rule.choice.trim().is_empty() {
            return fail(format!("decision rule {} has an empty choice", idx));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CompareOp, ConditionConfig, DelayConfig, DelayUnit, GateExpectation, ModelSpec, StepGate,
    };
    use serde_json::json;

    fn step(id: &str, order: u32, config: StepConfig) -> Step {
        Step {
            id: id.to_string(),
            workflow_id: "wf".to_string(),
            order,
            name: String::new(),
            config,
            gate: None,
        }
    }

    fn prompt_config() -> StepConfig {
        StepConfig::Prompt(PromptConfig {
            prompt: "Say hi to {{workflow.input.name}}".to_string(),
            system: None,
            variables: Default::default(),
            models: vec![ModelSpec::new("m1", "simulated", "echo")],
            routing: Default::default(),
        })
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "dup",
            vec![step("a", 1, prompt_config()), step("b", 1, prompt_config())],
        );
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("share order 1"));
    }

    #[test]
    fn prompt_without_enabled_models_is_rejected() {
        let mut spec = ModelSpec::new("m1", "simulated", "echo");
        spec.enabled = false;
        let wf = Workflow::new(
            "wf",
            "no-models",
            vec![step(
                "a",
                1,
                StepConfig::Prompt(PromptConfig {
                    prompt: "hello".to_string(),
                    system: None,
                    variables: Default::default(),
                    models: vec![spec],
                    routing: Default::default(),
                }),
            )],
        );
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn preferred_order_must_reference_known_models() {
        let mut routing = crate::model::ModelRoutingConfig::default();
        routing.preferred_order = vec!["ghost".to_string()];
        let wf = Workflow::new(
            "wf",
            "bad-order",
            vec![step(
                "a",
                1,
                StepConfig::Prompt(PromptConfig {
                    prompt: "hello".to_string(),
                    system: None,
                    variables: Default::default(),
                    models: vec![ModelSpec::new("m1", "simulated", "echo")],
                    routing,
                }),
            )],
        );
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn zero_duration_delay_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "delay",
            vec![step(
                "a",
                1,
                StepConfig::Delay(DelayConfig { duration: 0, unit: DelayUnit::Seconds }),
            )],
        );
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn gate_must_reference_a_prior_step() {
        let mut gated = step(
            "b",
            1,
            StepConfig::Condition(ConditionConfig {
                field: "{{workflow.input.x}}".to_string(),
                operator: CompareOp::Exists,
                value: json!(null),
            }),
        );
        gated.gate = Some(StepGate {
            step_id: "c".to_string(),
            expected: GateExpectation::Bool(true),
        });
        let later = step(
            "c",
            2,
            StepConfig::Condition(ConditionConfig {
                field: "{{workflow.input.x}}".to_string(),
                operator: CompareOp::Exists,
                value: json!(null),
            }),
        );

        let wf = Workflow::new("wf", "gate", vec![gated, later]);
        let err = validate_workflow(&wf).unwrap_err();
        assert!(err.to_string().contains("not prior"));
    }

    #[test]
    fn decision_without_rules_or_default_is_rejected() {
        let wf = Workflow::new(
            "wf",
            "decision",
            vec![step(
                "a",
                1,
                StepConfig::Decision(DecisionConfig { rules: vec![], default_choice: None }),
            )],
        );
        assert!(validate_workflow(&wf).is_err());
    }

    #[test]
    fn valid_workflow_passes() {
        let wf = Workflow::new("wf", "ok", vec![step("a", 1, prompt_config())]);
        assert!(validate_workflow(&wf).is_ok());
    }
}
