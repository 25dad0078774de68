//! Recovery workflow models.
//!
//! Workflows are loaded from `.orchestrator/workflows/*.yaml` or produced on
//! demand by a workflow provider.
//!
//! # Example
//!
//! ```yaml
//! name: restart-timed-out-stage
//! issue-type: STAGE_TIMEOUT
//! stage: development
//! timeout-ms: 60000
//! actions:
//!   - name: kill-worker
//!     operation: kill_process
//!     policy: best-effort
//!   - name: restart
//!     operation: restart_stage
//!     max-attempts: 3
//!     timeout-ms: 10000
//! ```

use crate::issue_models::IssueType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// What happens to the rest of a workflow when an action exhausts its
/// attempts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "kebab-case")]
pub enum ActionPolicy {
    /// Failure aborts the remaining actions.
    #[default]
    Required,

    /// Failure is recorded and the workflow continues.
    BestEffort,
}

/// One step of a recovery workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct WorkflowAction {
    pub name: String,

    /// Operation dispatched to the registered action handler.
    pub operation: String,

    /// Total attempt budget, falls back to the configured retry default.
    #[serde(default, alias = "max-retries", skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Deadline for a single attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub policy: ActionPolicy,

    /// Free-form parameters handed to the action handler.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl WorkflowAction {
    /// Create a required action with no parameters.
    pub fn new(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operation: operation.into(),
            max_attempts: None,
            timeout_ms: None,
            policy: ActionPolicy::Required,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.policy = ActionPolicy::BestEffort;
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// An ordered list of recovery actions bound to an issue type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct Workflow {
    pub name: String,

    pub issue_type: IssueType,

    /// Restricts the workflow to issues raised by this stage.
    ///
    /// A stage-scoped workflow is preferred over an unscoped one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Overall deadline, falls back to the configured recovery default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    pub actions: Vec<WorkflowAction>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, issue_type: IssueType) -> Self {
        Self {
            name: name.into(),
            issue_type,
            stage: None,
            timeout_ms: None,
            actions: Vec::new(),
        }
    }

    pub fn for_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_action(mut self, action: WorkflowAction) -> Self {
        self.actions.push(action);
        self
    }
}

/// Where the executed workflow came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowSource {
    Registered,
    Generated,
}

/// Result of one action within an execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Aggregate result of a workflow execution.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOutcome {
    /// Every action succeeded.
    Success,

    /// Required actions succeeded, some best-effort actions failed.
    PartialSuccess,

    Failed,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionOutcome::Success => "Success",
            ExecutionOutcome::PartialSuccess => "PartialSuccess",
            ExecutionOutcome::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Why an execution ended in [`ExecutionOutcome::Failed`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowFailure {
    /// No registered or generated workflow exists for the issue.
    NoWorkflowAvailable,

    /// A required action exhausted its attempts.
    ActionFailed { action: String, attempts: u32, reason: String },

    /// The overall workflow deadline passed.
    TimedOut { timeout_ms: u64 },
}

/// Run-record of one action.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ActionExecution {
    pub name: String,

    pub operation: String,

    pub outcome: ActionOutcome,

    pub attempts: u32,

    /// Last error reported by the handler.
    pub error: Option<String>,

    /// Output of the successful attempt.
    pub output: Option<serde_json::Value>,
}

/// Run-record of one workflow invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct WorkflowExecution {
    pub id: String,

    pub issue_id: String,

    pub issue_type: IssueType,

    /// Name of the executed workflow, absent when none was available.
    pub workflow_name: Option<String>,

    pub source: Option<WorkflowSource>,

    pub actions: Vec<ActionExecution>,

    pub outcome: ExecutionOutcome,

    pub failure: Option<WorkflowFailure>,

    /// Set when a rollback happened while the workflow ran, in which case
    /// the triggering issue was left unresolved.
    #[serde(default)]
    pub superseded: bool,

    #[ts(type = "string")]
    pub started_at: DateTime<Utc>,

    #[ts(type = "string")]
    pub finished_at: DateTime<Utc>,

    pub duration_ms: u64,
}

impl WorkflowExecution {
    pub fn is_success(&self) -> bool {
        self.outcome == ExecutionOutcome::Success
    }
}
