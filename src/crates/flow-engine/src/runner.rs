//! The workflow runner: drives steps strictly sequentially.
//!
//! A step never starts before the previous one reaches a terminal state,
//! because later steps may reference earlier outputs. Parallelism lives
//! inside the model router for a single PROMPT step, never across steps.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flow_core::{
    validate_workflow, ExecutionStatus, FlowError, GateExpectation, Result, RunContext, StepGate,
    StepResult, StepStatus, WorkflowExecution,
};
use llm::ProviderFactory;

use crate::router::ModelRouter;
use crate::steps::{executor_for, ExecEnv};
use crate::store::{ExecutionStore, WorkflowStore};

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// When false (preview mode) the run is identical but the execution
    /// record is never written to the store.
    pub persist: bool,

    pub trigger_id: Option<String>,

    /// Credential-lookup key for provider calls.
    pub user_id: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            persist: true,
            trigger_id: None,
            user_id: "local".to_string(),
        }
    }
}

impl RunOptions {
    pub fn preview() -> Self {
        Self { persist: false, ..Self::default() }
    }

    pub fn with_trigger(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

pub struct WorkflowRunner {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    router: Arc<ModelRouter>,
    http: reqwest::Client,
}

impl WorkflowRunner {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            workflows,
            executions,
            router: Arc::new(ModelRouter::new(factory)),
            http: reqwest::Client::new(),
        }
    }

    /// Run a workflow to completion.
    pub async fn run(
        &self,
        workflow_id: &str,
        input: Value,
        options: RunOptions,
    ) -> Result<WorkflowExecution> {
        self.run_with_cancel(workflow_id, input, options, CancellationToken::new())
            .await
    }

    /// Run with an external cancellation token. Cancellation is cooperative:
    /// it is honored at step boundaries and aborts retries early, but an
    /// already-dispatched provider or webhook call finishes first.
    pub async fn run_with_cancel(
        &self,
        workflow_id: &str,
        input: Value,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<WorkflowExecution> {
        let workflow = self
            .workflows
            .workflow(workflow_id)
            .await?
            .ok_or_else(|| FlowError::NotFound(format!("workflow '{}'", workflow_id)))?;

        // Fail fast on malformed config: nothing executes, no record is
        // created.
        validate_workflow(&workflow)?;

        let started = Instant::now();
        let mut execution = WorkflowExecution::new(&workflow.id, options.trigger_id.clone());
        info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            persist = options.persist,
            "starting workflow run"
        );

        let mut ctx = RunContext::new(input, workflow.variables.clone());
        let ordered = workflow.ordered_steps();
        for step in &ordered {
            ctx.register_step(&step.id, step.order);
        }

        let env = ExecEnv {
            router: self.router.clone(),
            http: self.http.clone(),
            user_id: options.user_id.clone(),
        };

        let mut results: Vec<StepResult> = Vec::with_capacity(ordered.len());
        let mut final_status = ExecutionStatus::Completed;

        for step in &ordered {
            if cancel.is_cancelled() {
                info!(workflow_id = %workflow.id, "cancellation requested, halting run");
                final_status = ExecutionStatus::Cancelled;
                break;
            }

            if let Some(gate) = &step.gate {
                if !gate_matches(gate, &results) {
                    debug!(step_id = %step.id, gate_step = %gate.step_id, "gate not satisfied, skipping");
                    results.push(StepResult::skipped(&step.id));
                    continue;
                }
            }

            debug!(step_id = %step.id, step_type = %step.step_type(), "executing step");
            let executor = executor_for(step.step_type());
            let result = executor.execute(step, &ctx, &env, &cancel).await;

            match result.status {
                StepStatus::Succeeded => {
                    ctx.record_output(&step.id, result.output.clone());
                    results.push(result);
                }
                StepStatus::Failed => {
                    error!(
                        step_id = %step.id,
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "step failed, halting run"
                    );
                    results.push(result);
                    final_status = ExecutionStatus::Failed;
                    break;
                }
                StepStatus::Cancelled => {
                    info!(step_id = %step.id, "step observed cancellation");
                    results.push(result);
                    final_status = ExecutionStatus::Cancelled;
                    break;
                }
                other => {
                    warn!(step_id = %step.id, status = ?other, "unexpected step status, treating as failure");
                    results.push(StepResult::failed(&step.id, format!("unexpected step status {:?}", other)));
                    final_status = ExecutionStatus::Failed;
                    break;
                }
            }
        }

        // Steps the run never reached are CANCELLED, whatever halted it.
        for step in ordered.iter().skip(results.len()) {
            results.push(StepResult::cancelled(&step.id));
        }

        execution.stats.tokens_used = results.iter().map(|r| r.tokens_used()).sum();
        execution.stats.duration_ms = started.elapsed().as_millis() as u64;
        execution.step_results = results;
        execution.status = final_status;
        execution.finished_at = Some(chrono::Utc::now());

        if options.persist {
            self.executions.save(&execution).await?;
        } else {
            debug!(execution_id = %execution.id, "preview run, skipping persistence");
        }

        info!(
            workflow_id = %workflow.id,
            execution_id = %execution.id,
            status = ?execution.status,
            duration_ms = execution.stats.duration_ms,
            "workflow run finished"
        );
        Ok(execution)
    }
}

/// A gated step runs only when its source step succeeded with the expected
/// output. A skipped source (or one the run never reached) gates to skip.
fn gate_matches(gate: &StepGate, results: &[StepResult]) -> bool {
    let Some(source) = results.iter().find(|r| r.step_id == gate.step_id) else {
        return false;
    };
    if source.status != StepStatus::Succeeded {
        return false;
    }
    match &gate.expected {
        GateExpectation::Bool(expected) => source.output.as_bool() == Some(*expected),
        GateExpectation::Choice(expected) => source.output.as_str() == Some(expected.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::StepResult;
    use serde_json::json;

    #[test]
    fn gate_matches_condition_output() {
        let results = vec![StepResult::succeeded("cond", json!(true))];

        let gate = StepGate {
            step_id: "cond".to_string(),
            expected: GateExpectation::Bool(true),
        };
        assert!(gate_matches(&gate, &results));

        let gate = StepGate {
            step_id: "cond".to_string(),
            expected: GateExpectation::Bool(false),
        };
        assert!(!gate_matches(&gate, &results));
    }

    #[test]
    fn gate_on_skipped_source_does_not_match() {
        let results = vec![StepResult::skipped("cond")];
        let gate = StepGate {
            step_id: "cond".to_string(),
            expected: GateExpectation::Bool(true),
        };
        assert!(!gate_matches(&gate, &results));
    }

    #[test]
    fn gate_matches_decision_branch() {
        let results = vec![StepResult::succeeded("pick", json!("fast-path"))];
        let gate = StepGate {
            step_id: "pick".to_string(),
            expected: GateExpectation::Choice("fast-path".to_string()),
        };
        assert!(gate_matches(&gate, &results));
    }
}
