//! Trigger store seam, consumed read-only by the scheduler.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use flow_core::{Result, Trigger};

#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// All active triggers. The scheduler re-reads this on every sync.
    async fn active_triggers(&self) -> Result<Vec<Trigger>>;

    async fn trigger(&self, id: &str) -> Result<Option<Trigger>>;
}

#[derive(Default)]
pub struct InMemoryTriggerStore {
    triggers: RwLock<HashMap<String, Trigger>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trigger: Trigger) {
        self.triggers.write().insert(trigger.id.clone(), trigger);
    }

    pub fn remove(&self, id: &str) {
        self.triggers.write().remove(id);
    }
}

#[async_trait]
impl TriggerStore for InMemoryTriggerStore {
    async fn active_triggers(&self) -> Result<Vec<Trigger>> {
        Ok(self
            .triggers
            .read()
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn trigger(&self, id: &str) -> Result<Option<Trigger>> {
        Ok(self.triggers.read().get(id).cloned())
    }
}
