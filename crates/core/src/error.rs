//! Error types for the orchestration core.
//!
//! Validation and stack errors are local to the caller and never alter the
//! committed state. Persistence errors are the only category that threatens
//! crash recovery and are escalated loudly by the checkpoint layer.

use po_protocol::issue_models::IssueType;
use po_protocol::state_models::{EventType, PipelineState};
use thiserror::Error;

/// Errors surfaced by the orchestration core.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The transition table has no entry for `(from, event)`, or its target
    /// differs from the requested one.
    #[error("Illegal transition from {from} on {event} to {requested}")]
    IllegalTransition {
        from: PipelineState,
        event: EventType,
        requested: PipelineState,
    },

    /// `pop` or `rollback_to` was called past the bottom of the stack.
    #[error("Pushdown stack underflow")]
    StackUnderflow,

    /// Neither a registered nor a generated workflow exists for the issue.
    #[error("No workflow available for issue type {0}")]
    NoWorkflowAvailable(IssueType),

    /// A workflow action exhausted its attempt budget.
    #[error("Workflow action {action} failed after {attempts} attempt(s): {reason}")]
    WorkflowActionFailed {
        action: String,
        attempts: u32,
        reason: String,
    },

    /// `resume` was called for a run without a checkpoint.
    #[error("No checkpoint available for run {0}")]
    NoCheckpointAvailable(String),

    /// The checkpoint store kept failing after the configured retries.
    #[error("Failed to persist checkpoint for run {run_id} after {attempts} attempt(s): {source}")]
    PersistenceWriteFailed {
        run_id: String,
        attempts: u32,
        source: std::io::Error,
    },

    /// Reading the checkpoint store failed.
    #[error("Failed to read checkpoint for run {run_id}: {source}")]
    PersistenceReadFailed {
        run_id: String,
        source: std::io::Error,
    },

    /// An issue id is not in the active set.
    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    /// A checkpoint could not be encoded or decoded.
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Result with OrchestratorError.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
