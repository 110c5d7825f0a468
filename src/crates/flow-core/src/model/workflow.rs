//! Workflow: a named, ordered list of steps executed as a unit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::step::Step;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Named run variables, resolvable as `{{workflow.<name>}}`.
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// Owned steps; deletion of the workflow cascades to them.
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            variables: HashMap::new(),
            steps,
        }
    }

    /// Steps sorted by `order`. Execution order is authoritative here, not
    /// declaration order.
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

fn default_true() -> bool {
    true
}
