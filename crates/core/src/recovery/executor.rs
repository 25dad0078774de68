//! Workflow executor.
//!
//! The executor finds a workflow for an issue, runs its actions in order
//! with per-action retries and exponential backoff, and aggregates the
//! outcome into a [`WorkflowExecution`]. It never touches pipeline state:
//! the caller decides what a successful execution means for the run.

use crate::config::models::{RecoveryConfig, RetryConfig};
use crate::error::OrchestratorError;
use crate::recovery::actions::{ActionRegistry, RecoveryContext};
use crate::recovery::backoff::BackoffPolicy;
use crate::recovery::provider::{generate_with_timeout, WorkflowProvider};
use crate::recovery::registry::WorkflowRegistry;
use chrono::Utc;
use parking_lot::RwLock;
use po_protocol::issue_models::IssueType;
use po_protocol::workflow_models::{
    ActionExecution, ActionOutcome, ActionPolicy, ExecutionOutcome, Workflow, WorkflowAction,
    WorkflowExecution, WorkflowFailure, WorkflowSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a single action ended.
enum ActionEnd {
    Succeeded,
    Failed,
    /// The workflow's overall deadline passed while the action ran.
    DeadlineExceeded,
}

/// Executes recovery workflows for issues.
pub struct WorkflowExecutor {
    workflows: RwLock<WorkflowRegistry>,
    actions: ActionRegistry,
    provider: Option<Arc<dyn WorkflowProvider>>,
    backoff: BackoffPolicy,
    default_attempts: u32,
    recovery: RecoveryConfig,
}

impl WorkflowExecutor {
    /// Create an executor with the given workflows and action handlers.
    pub fn new(
        workflows: WorkflowRegistry,
        actions: ActionRegistry,
        retry: &RetryConfig,
        recovery: RecoveryConfig,
    ) -> Self {
        Self {
            workflows: RwLock::new(workflows),
            actions,
            provider: None,
            backoff: retry.into(),
            default_attempts: retry.max_attempts.max(1),
            recovery,
        }
    }

    /// Consult `provider` when no registered workflow matches.
    pub fn with_provider(mut self, provider: Arc<dyn WorkflowProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Returns `false` when the workflow has no actions and was ignored.
    pub fn register_workflow(&self, workflow: Workflow) -> bool {
        self.workflows.write().register(workflow)
    }

    pub fn workflows(&self) -> Vec<Workflow> {
        self.workflows.read().workflows().to_vec()
    }

    /// Run the recovery workflow for `issue_type`.
    ///
    /// Never fails: every problem, including the absence of a workflow, is
    /// reported in the returned execution record.
    pub async fn execute_workflow(
        &self,
        issue_type: IssueType,
        context: &RecoveryContext,
    ) -> WorkflowExecution {
        let started_at = Utc::now();
        let clock = Instant::now();

        let Some((workflow, source)) = self.resolve_workflow(issue_type, context).await else {
            warn!(
                run_id = %context.run_id,
                issue_id = %context.issue.id,
                "{}",
                OrchestratorError::NoWorkflowAvailable(issue_type)
            );
            return WorkflowExecution {
                id: Uuid::new_v4().to_string(),
                issue_id: context.issue.id.clone(),
                issue_type,
                workflow_name: None,
                source: None,
                actions: Vec::new(),
                outcome: ExecutionOutcome::Failed,
                failure: Some(WorkflowFailure::NoWorkflowAvailable),
                superseded: false,
                started_at,
                finished_at: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
            };
        };

        let timeout = workflow
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.recovery.workflow_timeout());
        let deadline = clock + timeout;

        info!(
            run_id = %context.run_id,
            issue_id = %context.issue.id,
            workflow = %workflow.name,
            actions = workflow.actions.len(),
            "Executing recovery workflow"
        );

        let mut records = Vec::with_capacity(workflow.actions.len());
        let mut failure: Option<WorkflowFailure> = None;

        for action in &workflow.actions {
            if failure.is_some() {
                records.push(ActionExecution {
                    name: action.name.clone(),
                    operation: action.operation.clone(),
                    outcome: ActionOutcome::Skipped,
                    attempts: 0,
                    error: None,
                    output: None,
                });
                continue;
            }

            let (record, end) = self.run_action(action, context, deadline).await;
            match end {
                ActionEnd::Succeeded => {}
                ActionEnd::Failed if action.policy == ActionPolicy::BestEffort => {
                    debug!(action = %action.name, "Best-effort action failed, continuing");
                }
                ActionEnd::Failed => {
                    failure = Some(WorkflowFailure::ActionFailed {
                        action: action.name.clone(),
                        attempts: record.attempts,
                        reason: record.error.clone().unwrap_or_default(),
                    });
                }
                ActionEnd::DeadlineExceeded => {
                    warn!(
                        workflow = %workflow.name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Workflow deadline exceeded"
                    );
                    failure = Some(WorkflowFailure::TimedOut {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
            records.push(record);
        }

        let outcome = if failure.is_some() {
            ExecutionOutcome::Failed
        } else if records.iter().any(|r| r.outcome == ActionOutcome::Failed) {
            ExecutionOutcome::PartialSuccess
        } else {
            ExecutionOutcome::Success
        };

        let duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            run_id = %context.run_id,
            workflow = %workflow.name,
            %outcome,
            duration_ms,
            "Recovery workflow finished"
        );

        WorkflowExecution {
            id: Uuid::new_v4().to_string(),
            issue_id: context.issue.id.clone(),
            issue_type,
            workflow_name: Some(workflow.name),
            source: Some(source),
            actions: records,
            outcome,
            failure,
            superseded: false,
            started_at,
            finished_at: Utc::now(),
            duration_ms,
        }
    }

    async fn resolve_workflow(
        &self,
        issue_type: IssueType,
        context: &RecoveryContext,
    ) -> Option<(Workflow, WorkflowSource)> {
        let registered = self
            .workflows
            .read()
            .lookup(issue_type, &context.issue.stage)
            .cloned();
        if let Some(workflow) = registered {
            return Some((workflow, WorkflowSource::Registered));
        }

        if !self.recovery.generation_enabled {
            return None;
        }
        let provider = self.provider.as_ref()?;

        let mut workflow = generate_with_timeout(
            provider.as_ref(),
            context,
            self.recovery.generation_timeout(),
        )
        .await?;
        workflow.issue_type = issue_type;

        if self.recovery.cache_generated {
            debug!(workflow = %workflow.name, "Caching generated workflow");
            self.register_workflow(workflow.clone());
        }
        Some((workflow, WorkflowSource::Generated))
    }

    async fn run_action(
        &self,
        action: &WorkflowAction,
        context: &RecoveryContext,
        deadline: Instant,
    ) -> (ActionExecution, ActionEnd) {
        let mut record = ActionExecution {
            name: action.name.clone(),
            operation: action.operation.clone(),
            outcome: ActionOutcome::Failed,
            attempts: 0,
            error: None,
            output: None,
        };

        let Some(handler) = self.actions.get(&action.operation) else {
            record.error = Some(format!(
                "no handler registered for operation '{}'",
                action.operation
            ));
            warn!(action = %action.name, operation = %action.operation, "Unknown action operation");
            return (record, ActionEnd::Failed);
        };

        let max_attempts = action.max_attempts.unwrap_or(self.default_attempts).max(1);
        let attempt_timeout = action
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.recovery.action_timeout());

        for attempt in 0..max_attempts {
            let now = Instant::now();
            if now >= deadline {
                record.error.get_or_insert_with(|| "workflow deadline exceeded".to_string());
                return (record, ActionEnd::DeadlineExceeded);
            }

            let attempt_deadline = (now + attempt_timeout).min(deadline);
            record.attempts += 1;

            let retryable = match tokio::time::timeout_at(
                attempt_deadline,
                handler.execute(action, context),
            )
            .await
            {
                Ok(Ok(output)) => {
                    record.outcome = ActionOutcome::Succeeded;
                    record.output = Some(output);
                    record.error = None;
                    debug!(action = %action.name, attempts = record.attempts, "Action succeeded");
                    return (record, ActionEnd::Succeeded);
                }
                Ok(Err(e)) => {
                    let retryable = e.is_transient();
                    record.error = Some(e.to_string());
                    retryable
                }
                Err(_) if attempt_deadline >= deadline => {
                    record.error = Some("workflow deadline exceeded".to_string());
                    return (record, ActionEnd::DeadlineExceeded);
                }
                Err(_) => {
                    record.error = Some(format!(
                        "attempt timed out after {}ms",
                        attempt_timeout.as_millis()
                    ));
                    true
                }
            };

            if !retryable {
                break;
            }

            if attempt + 1 < max_attempts {
                let delay = self.backoff.delay(attempt);
                debug!(
                    action = %action.name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying action after backoff"
                );
                tokio::time::sleep_until((Instant::now() + delay).min(deadline)).await;
            }
        }

        let err = OrchestratorError::WorkflowActionFailed {
            action: action.name.clone(),
            attempts: record.attempts,
            reason: record.error.clone().unwrap_or_default(),
        };
        warn!(run_id = %context.run_id, "{err}");
        (record, ActionEnd::Failed)
    }
}
