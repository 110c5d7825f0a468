//! Run context threaded through a workflow execution.

use serde_json::Value;
use std::collections::HashMap;

/// Mutable state visible to binding tokens during one run.
///
/// Every step of the workflow is registered up front with its `order`, so the
/// resolver can distinguish a forward reference (step exists but is not
/// strictly prior) from an unknown step. Outputs are recorded as steps reach
/// SUCCEEDED; a skipped or failed step never records an output.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    input: Value,
    variables: HashMap<String, Value>,
    step_orders: HashMap<String, u32>,
    outputs: HashMap<String, Value>,
}

impl RunContext {
    pub fn new(input: Value, variables: HashMap<String, Value>) -> Self {
        Self {
            input,
            variables,
            step_orders: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    /// Declare a step and its order before the run starts.
    pub fn register_step(&mut self, id: impl Into<String>, order: u32) {
        self.step_orders.insert(id.into(), order);
    }

    /// Record a succeeded step's output, making it visible to later steps.
    pub fn record_output(&mut self, id: impl Into<String>, output: Value) {
        self.outputs.insert(id.into(), output);
    }

    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn step_order(&self, id: &str) -> Option<u32> {
        self.step_orders.get(id).copied()
    }

    pub fn step_output(&self, id: &str) -> Option<&Value> {
        self.outputs.get(id)
    }

    /// A copy of this context with extra variables overlaid, used for
    /// prompt-local variable declarations.
    pub fn overlay_variables(&self, extra: HashMap<String, Value>) -> Self {
        let mut ctx = self.clone();
        ctx.variables.extend(extra);
        ctx
    }
}
