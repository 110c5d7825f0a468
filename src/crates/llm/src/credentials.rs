//! Credential lookup, delegated to an external store.
//!
//! The engine never persists API keys; it reads them keyed by
//! `(user_id, provider)` from whatever the surrounding application provides.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;

/// Read-only credential store consumed by the provider factory.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The API key for `(user_id, provider)`, or `None` if absent. Absence
    /// is a fatal credential error upstream, never a silent simulation.
    async fn api_key(&self, user_id: &str, provider: &str) -> Result<Option<String>>;
}

/// In-memory credential store for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    keys: RwLock<HashMap<(String, String), String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        user_id: impl Into<String>,
        provider: impl Into<String>,
        api_key: impl Into<String>,
    ) {
        self.keys
            .write()
            .insert((user_id.into(), provider.into()), api_key.into());
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn api_key(&self, user_id: &str, provider: &str) -> Result<Option<String>> {
        Ok(self
            .keys
            .read()
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned())
    }
}
