//! Action handler trait and supporting types.
//!
//! A workflow action names an `operation`; the executor looks the operation
//! up in an [`ActionRegistry`] and hands the action to its handler.

use async_trait::async_trait;
use po_protocol::issue_models::Issue;
use po_protocol::workflow_models::WorkflowAction;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Context information passed to action handlers and workflow providers.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    /// Run the issue belongs to.
    pub run_id: String,

    /// The issue being recovered from.
    pub issue: Issue,

    /// Free-form attributes supplied by the pipeline driver.
    pub attributes: BTreeMap<String, String>,
}

impl RecoveryContext {
    pub fn new(run_id: impl Into<String>, issue: Issue) -> Self {
        Self {
            run_id: run_id.into(),
            issue,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Worth retrying: network blips, rate limits, busy resources.
    #[error("Transient failure: {0}")]
    Transient(String),
    /// Retrying cannot help.
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl ActionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ActionError::Transient(_))
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(
        &self,
        action: &WorkflowAction,
        context: &RecoveryContext,
    ) -> Result<serde_json::Value, ActionError>;
}

/// Operation name -> handler.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(operation.into(), handler);
    }

    pub fn with_handler(mut self, operation: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(operation, handler);
        self
    }

    pub fn get(&self, operation: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(operation).cloned()
    }

    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}
