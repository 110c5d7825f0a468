//! Store seams consumed by the engine.
//!
//! Persistence is an external collaborator: the engine loads workflows and
//! writes execution records through these traits and never cares what sits
//! behind them. The in-memory implementations serve tests and single-process
//! embedding.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use flow_core::{Result, Workflow, WorkflowExecution};

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn workflow(&self, id: &str) -> Result<Option<Workflow>>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn save(&self, execution: &WorkflowExecution) -> Result<()>;

    async fn execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>>;
}

#[derive(Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<HashMap<String, Workflow>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, workflow: Workflow) {
        self.workflows.write().insert(workflow.id.clone(), workflow);
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn workflow(&self, id: &str) -> Result<Option<Workflow>> {
        Ok(self.workflows.read().get(id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<Vec<WorkflowExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All saved executions, in save order.
    pub fn saved(&self) -> Vec<WorkflowExecution> {
        self.executions.read().clone()
    }

    pub fn count(&self) -> usize {
        self.executions.read().len()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save(&self, execution: &WorkflowExecution) -> Result<()> {
        self.executions.write().push(execution.clone());
        Ok(())
    }

    async fn execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>> {
        Ok(self.executions.read().iter().find(|e| e.id == id).cloned())
    }
}
