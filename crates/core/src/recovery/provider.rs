//! On-demand workflow generation.
//!
//! When no registered workflow matches an issue, the executor may ask a
//! [`WorkflowProvider`] to produce one. Providers are typically backed by a
//! language model and can be slow, so every call runs under a deadline.

use crate::recovery::actions::RecoveryContext;
use async_trait::async_trait;
use po_protocol::workflow_models::Workflow;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait WorkflowProvider: Send + Sync {
    /// Produce a workflow for the context's issue, or `None` when no
    /// recovery is possible.
    async fn generate(&self, context: &RecoveryContext) -> anyhow::Result<Option<Workflow>>;
}

/// Call `provider` with a deadline. Errors and timeouts count as "no
/// workflow": the caller only needs to know whether one was produced.
pub async fn generate_with_timeout(
    provider: &dyn WorkflowProvider,
    context: &RecoveryContext,
    timeout: Duration,
) -> Option<Workflow> {
    match tokio::time::timeout(timeout, provider.generate(context)).await {
        Ok(Ok(Some(workflow))) if !workflow.actions.is_empty() => Some(workflow),
        Ok(Ok(Some(workflow))) => {
            warn!(workflow = %workflow.name, "Generated workflow has no actions, ignoring");
            None
        }
        Ok(Ok(None)) => None,
        Ok(Err(e)) => {
            warn!(issue_id = %context.issue.id, "Workflow generation failed: {e:#}");
            None
        }
        Err(_) => {
            warn!(
                issue_id = %context.issue.id,
                timeout_ms = timeout.as_millis() as u64,
                "Workflow generation timed out"
            );
            None
        }
    }
}
