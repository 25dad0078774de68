//! Orchestrator facade.
//!
//! [`Orchestrator`] is the only type a pipeline driver talks to. It owns one
//! run's transition engine, stage registry, issue registry, workflow
//! executor and checkpoint manager, and routes calls between them:
//!
//! - stage completions and failures go to the stage registry and then to
//!   the checkpoint store
//! - reported issues go to the workflow executor
//! - a successful workflow resolves its issue and fires `IssueResolved`
//!
//! The facade adds no policy of its own beyond this wiring.

use crate::checkpoint::{
    CheckpointManager, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use crate::config::models::{AppConfig, OrchestratorConfig};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::health::HealthPolicy;
use crate::recovery::{
    ActionHandler, ActionRegistry, IssueRegistry, RecoveryContext, WorkflowExecutor,
    WorkflowProvider, WorkflowRegistry,
};
use crate::state::{
    ChannelObserver, StageStateManager, StateValidator, TransitionEngine, TransitionObserver,
    TransitionTable,
};
use chrono::Utc;
use parking_lot::Mutex;
use po_protocol::checkpoint_models::{PipelineSnapshot, StageRecord};
use po_protocol::events::Event;
use po_protocol::issue_models::{Issue, IssueType, Severity};
use po_protocol::state_models::{EventType, PipelineState, StackFrame, StageState, StateTransition};
use po_protocol::stats_models::OrchestratorStats;
use po_protocol::workflow_models::{ExecutionOutcome, Workflow, WorkflowExecution};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Collects the collaborators of an [`Orchestrator`] before construction.
pub struct OrchestratorBuilder {
    run_id: String,
    config: OrchestratorConfig,
    table: TransitionTable,
    observers: Vec<Arc<dyn TransitionObserver>>,
    workflows: Vec<Workflow>,
    actions: ActionRegistry,
    provider: Option<Arc<dyn WorkflowProvider>>,
    store: Option<Arc<dyn CheckpointStore>>,
    events_tx: Option<mpsc::Sender<Event>>,
}

impl OrchestratorBuilder {
    fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            config: OrchestratorConfig::default(),
            table: TransitionTable::standard(),
            observers: Vec::new(),
            workflows: Vec::new(),
            actions: ActionRegistry::new(),
            provider: None,
            store: None,
            events_tx: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use settings and workflows loaded from `root/.orchestrator/`, with
    /// checkpoints stored under the configured directory below `root`.
    pub fn with_app_config(mut self, root: &Path, app_config: AppConfig) -> Self {
        let directory = root.join(&app_config.settings.persistence.directory);
        self.store = Some(Arc::new(FileCheckpointStore::new(directory)));
        self.workflows.extend(app_config.workflows);
        self.config = app_config.settings;
        self
    }

    /// Replace the standard transition table.
    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    /// Add a transition observer. Observers are notified in the order they
    /// were added.
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.push(workflow);
        self
    }

    pub fn with_action_handler(
        mut self,
        operation: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Self {
        self.actions.register(operation, handler);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn WorkflowProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Store checkpoints in `store`. Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Forward transitions, issue changes and workflow results to `events_tx`.
    ///
    /// The transition forwarder is registered as an observer at this point
    /// in the observer order.
    pub fn with_events(mut self, events_tx: mpsc::Sender<Event>) -> Self {
        self.observers
            .push(Arc::new(ChannelObserver::new(events_tx.clone())));
        self.events_tx = Some(events_tx);
        self
    }

    /// Build an orchestrator for a fresh run starting at `Idle`.
    pub fn build(self) -> Orchestrator {
        let engine = TransitionEngine::new(
            self.run_id.clone(),
            StateValidator::new(self.table.clone()),
            self.observers.clone(),
        );
        self.assemble(engine, StageStateManager::new(), IssueRegistry::new())
    }

    /// Build an orchestrator continuing the run captured by `snapshot`.
    ///
    /// The engine starts at the snapshot's state with history numbered from
    /// its cursor; stages and unresolved issues are rehydrated. The
    /// snapshot's run id replaces the builder's.
    pub fn restore(mut self, snapshot: PipelineSnapshot) -> Orchestrator {
        self.run_id = snapshot.run_id.clone();

        let engine = TransitionEngine::resumed(
            self.run_id.clone(),
            StateValidator::new(self.table.clone()),
            self.observers.clone(),
            snapshot.pipeline_state,
            snapshot.history_cursor,
        );
        let stages = StageStateManager::from_records(snapshot.stage_states);

        let mut issues = IssueRegistry::new();
        for issue in snapshot.active_issues {
            issues.restore_active(issue);
        }
        for id in &snapshot.unresolved_issue_ids {
            if !issues.is_active(id) {
                warn!(run_id = %self.run_id, issue_id = %id, "Unresolved issue has no stored record");
            }
        }

        info!(
            run_id = %self.run_id,
            state = %snapshot.pipeline_state,
            cursor = snapshot.history_cursor,
            stages = stages.len(),
            "Restored run from checkpoint"
        );
        self.assemble(engine, stages, issues)
    }

    fn assemble(
        self,
        engine: TransitionEngine,
        stages: StageStateManager,
        issues: IssueRegistry,
    ) -> Orchestrator {
        let mut executor = WorkflowExecutor::new(
            WorkflowRegistry::from_workflows(self.workflows),
            self.actions,
            &self.config.retry,
            self.config.recovery.clone(),
        );
        if let Some(provider) = self.provider {
            executor = executor.with_provider(provider);
        }

        let store: Arc<dyn CheckpointStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryCheckpointStore::new()),
        };

        Orchestrator {
            run_id: self.run_id,
            engine,
            stages,
            issues: Mutex::new(issues),
            executor,
            checkpoints: CheckpointManager::new(store, &self.config.persistence),
            health: self.config.health.clone().into(),
            executions: Mutex::new(Vec::new()),
            workflow_counters: WorkflowCounters::default(),
            events_tx: self.events_tx,
        }
    }
}

#[derive(Default)]
struct WorkflowCounters {
    succeeded: AtomicU64,
    partial: AtomicU64,
    failed: AtomicU64,
    superseded: AtomicU64,
}

/// Facade over one pipeline run.
pub struct Orchestrator {
    run_id: String,
    engine: TransitionEngine,
    stages: StageStateManager,
    issues: Mutex<IssueRegistry>,
    executor: WorkflowExecutor,
    checkpoints: CheckpointManager,
    health: HealthPolicy,
    executions: Mutex<Vec<WorkflowExecution>>,
    workflow_counters: WorkflowCounters,
    events_tx: Option<mpsc::Sender<Event>>,
}

impl Orchestrator {
    /// Start configuring an orchestrator for `run_id`.
    pub fn builder(run_id: impl Into<String>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(run_id)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn engine(&self) -> &TransitionEngine {
        &self.engine
    }

    pub fn health_policy(&self) -> &HealthPolicy {
        &self.health
    }

    // --- pipeline state ---

    pub fn current_state(&self) -> PipelineState {
        self.engine.current_state()
    }

    pub fn is_legal(&self, event: EventType) -> Option<PipelineState> {
        self.engine.is_legal(event)
    }

    pub fn transition(&self, to: PipelineState, event: EventType) -> bool {
        self.engine.transition(to, event)
    }

    pub fn transition_with(
        &self,
        to: PipelineState,
        event: EventType,
        reason: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        self.engine.transition_with(to, event, reason, metadata)
    }

    pub fn try_transition(
        &self,
        to: PipelineState,
        event: EventType,
        reason: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> OrchestratorResult<StateTransition> {
        self.engine.try_transition(to, event, reason, metadata)
    }

    pub fn history(&self) -> Vec<StateTransition> {
        self.engine.history()
    }

    // --- pushdown ---

    pub fn push(&self, reason: impl Into<String>) -> usize {
        self.engine.push(reason)
    }

    pub fn pop(&self) -> OrchestratorResult<PipelineState> {
        self.engine.pop()
    }

    pub fn peek(&self) -> Option<PipelineState> {
        self.engine.peek()
    }

    pub fn rollback_to(&self, depth: usize) -> bool {
        self.engine.rollback_to(depth)
    }

    pub fn stack_depth(&self) -> usize {
        self.engine.stack_depth()
    }

    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.engine.stack_frames()
    }

    // --- stages ---

    pub fn register_stage(&self, name: &str) -> bool {
        self.stages.register_stage(name)
    }

    pub fn remove_stage(&self, name: &str) -> Option<StageRecord> {
        self.stages.remove_stage(name)
    }

    /// Update a stage without persisting. Never changes pipeline state.
    pub fn set_stage_state(&self, name: &str, state: StageState, result: Option<serde_json::Value>) {
        self.stages.set_stage_state(name, state, result);
    }

    pub fn get_stage_state(&self, name: &str) -> Option<StageState> {
        self.stages.get_stage_state(name)
    }

    /// Stages and their states in registration order.
    pub fn stage_states(&self) -> Vec<(String, StageState)> {
        self.stages.list_stages()
    }

    pub fn stage_records(&self) -> Vec<StageRecord> {
        self.stages.records()
    }

    /// Mark a stage `Completed` and checkpoint the run.
    pub async fn complete_stage(
        &self,
        name: &str,
        result: Option<serde_json::Value>,
    ) -> OrchestratorResult<()> {
        self.stages.set_stage_state(name, StageState::Completed, result);
        self.save_checkpoint().await.map(|_| ())
    }

    /// Mark a stage `Failed` and checkpoint the run.
    ///
    /// Pipeline health is left alone; call
    /// [`Orchestrator::apply_health_policy`] to react to the failure.
    pub async fn fail_stage(
        &self,
        name: &str,
        result: Option<serde_json::Value>,
    ) -> OrchestratorResult<()> {
        self.stages.set_stage_state(name, StageState::Failed, result);
        self.save_checkpoint().await.map(|_| ())
    }

    /// Compare failed and total stage counts against the health policy and
    /// fire the matching health event when it is legal from the current
    /// state. Returns the new state if a transition was committed.
    pub fn apply_health_policy(&self) -> Option<PipelineState> {
        let failed = self.stages.count_in(StageState::Failed);
        let total = self.stages.len();
        let status = self.health.evaluate(failed, total);

        let current = self.engine.current_state();
        let event = status.event_from(current)?;
        let target = self.engine.is_legal(event)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("failed_stages".to_string(), failed.to_string());
        metadata.insert("total_stages".to_string(), total.to_string());
        let reason = format!("{failed} of {total} stage(s) failed");

        self.engine
            .transition_with(target, event, Some(reason), metadata)
            .then_some(target)
    }

    // --- issues and workflows ---

    /// Record a detected issue. Repeated detections of the same type on
    /// the same stage update the existing issue.
    pub fn register_issue(
        &self,
        issue_type: IssueType,
        stage: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> Issue {
        let (issue, is_new) = self
            .issues
            .lock()
            .register(issue_type, stage, severity, message);
        if is_new {
            self.emit(Event::IssueRegistered {
                run_id: self.run_id.clone(),
                issue: issue.clone(),
            });
        }
        issue
    }

    /// Move an issue out of the active set.
    pub fn resolve_issue(&self, issue_id: &str) -> OrchestratorResult<Issue> {
        let issue = self
            .issues
            .lock()
            .resolve(issue_id)
            .ok_or_else(|| OrchestratorError::IssueNotFound(issue_id.to_string()))?;
        self.emit(Event::IssueResolved {
            run_id: self.run_id.clone(),
            issue_id: issue.id.clone(),
        });
        Ok(issue)
    }

    /// Active issues ordered by first detection.
    pub fn active_issues(&self) -> Vec<Issue> {
        self.issues.lock().active()
    }

    pub fn resolved_issues(&self) -> Vec<Issue> {
        self.issues.lock().resolved()
    }

    /// Register an issue and immediately run its recovery workflow.
    pub async fn report_issue(
        &self,
        issue_type: IssueType,
        stage: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> OrchestratorResult<WorkflowExecution> {
        let issue = self.register_issue(issue_type, stage, severity, message);
        self.execute_workflow(&issue.id).await
    }

    /// Run the recovery workflow for an active issue.
    ///
    /// No lock is held while the workflow runs. On success the issue is
    /// resolved and `IssueResolved` is fired when legal, unless the
    /// pushdown stack was popped in the meantime: the execution is then
    /// marked superseded and the issue stays active. Failed and partially
    /// successful executions leave the issue active.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::IssueNotFound`] when `issue_id` is not active.
    pub async fn execute_workflow(&self, issue_id: &str) -> OrchestratorResult<WorkflowExecution> {
        let issue = self
            .issues
            .lock()
            .get(issue_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::IssueNotFound(issue_id.to_string()))?;

        let epoch = self.engine.rollback_epoch();
        let context = RecoveryContext::new(self.run_id.clone(), issue.clone());
        let mut execution = self.executor.execute_workflow(issue.issue_type, &context).await;

        match execution.outcome {
            ExecutionOutcome::Success if self.engine.rollback_epoch() != epoch => {
                warn!(
                    run_id = %self.run_id,
                    issue_id = %issue.id,
                    "Pipeline rolled back during recovery, leaving issue active"
                );
                execution.superseded = true;
            }
            ExecutionOutcome::Success => {
                if self.resolve_issue(&issue.id).is_ok() {
                    self.fire_issue_resolved(&issue, &execution);
                }
            }
            ExecutionOutcome::PartialSuccess | ExecutionOutcome::Failed => {
                warn!(
                    run_id = %self.run_id,
                    issue_id = %issue.id,
                    outcome = %execution.outcome,
                    "Issue remains active after recovery, escalation required"
                );
            }
        }

        let counters = &self.workflow_counters;
        let counter = match execution.outcome {
            _ if execution.superseded => &counters.superseded,
            ExecutionOutcome::Success => &counters.succeeded,
            ExecutionOutcome::PartialSuccess => &counters.partial,
            ExecutionOutcome::Failed => &counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.executions.lock().push(execution.clone());
        self.emit(Event::WorkflowFinished {
            run_id: self.run_id.clone(),
            execution: execution.clone(),
        });
        Ok(execution)
    }

    /// Every workflow execution of this run, oldest first.
    pub fn workflow_executions(&self) -> Vec<WorkflowExecution> {
        self.executions.lock().clone()
    }

    /// Register a workflow after construction. Workflows without actions
    /// are ignored and `false` returned.
    pub fn register_workflow(&self, workflow: Workflow) -> bool {
        self.executor.register_workflow(workflow)
    }

    pub fn workflows(&self) -> Vec<Workflow> {
        self.executor.workflows()
    }

    fn fire_issue_resolved(&self, issue: &Issue, execution: &WorkflowExecution) {
        let Some(target) = self.engine.is_legal(EventType::IssueResolved) else {
            return;
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("issue_id".to_string(), issue.id.clone());
        metadata.insert("execution_id".to_string(), execution.id.clone());
        if let Some(workflow) = &execution.workflow_name {
            metadata.insert("workflow".to_string(), workflow.clone());
        }

        self.engine.transition_with(
            target,
            EventType::IssueResolved,
            Some(format!("{} on {} recovered", issue.issue_type, issue.stage)),
            metadata,
        );
    }

    // --- persistence ---

    /// Snapshot of the last committed state of the run.
    pub fn snapshot(&self) -> PipelineSnapshot {
        let (pipeline_state, history_cursor) = self.engine.committed_view();
        let active_issues = self.active_issues();

        PipelineSnapshot {
            run_id: self.run_id.clone(),
            pipeline_state,
            stage_states: self.stages.records(),
            unresolved_issue_ids: active_issues.iter().map(|i| i.id.clone()).collect(),
            active_issues,
            history_cursor,
            saved_at: Utc::now(),
        }
    }

    /// Overwrite this run's checkpoint with a fresh snapshot. Returns
    /// `false` when a newer snapshot was written concurrently.
    pub async fn save_checkpoint(&self) -> OrchestratorResult<bool> {
        self.checkpoints
            .save_checkpoint_with(|| self.snapshot())
            .await
    }

    /// Record a stage in the stage registry and update its entry inside
    /// this run's checkpoint.
    ///
    /// Unset result and timestamps keep the values already held for the
    /// stage, so later full checkpoints agree with this one.
    pub async fn save_stage_checkpoint(
        &self,
        stage: &str,
        status: StageState,
        result: Option<serde_json::Value>,
        started_at: Option<chrono::DateTime<Utc>>,
        ended_at: Option<chrono::DateTime<Utc>>,
    ) -> OrchestratorResult<()> {
        let record = self.stages.apply_record(StageRecord {
            name: stage.to_string(),
            state: status,
            result,
            started_at,
            ended_at,
        });
        self.checkpoints
            .save_stage_checkpoint(
                &self.run_id,
                &record.name,
                record.state,
                record.result,
                record.started_at,
                record.ended_at,
            )
            .await
    }

    pub async fn can_resume(&self, run_id: &str) -> bool {
        self.checkpoints.can_resume(run_id).await
    }

    /// Read back the checkpoint of `run_id`.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NoCheckpointAvailable`] when none exists.
    pub async fn resume(&self, run_id: &str) -> OrchestratorResult<PipelineSnapshot> {
        self.checkpoints.resume(run_id).await
    }

    // --- stats ---

    pub fn stats(&self) -> OrchestratorStats {
        let mut stats = OrchestratorStats::default();
        self.engine.fill_stats(&mut stats);

        {
            let issues = self.issues.lock();
            stats.issues_registered = issues.registered_count();
            stats.issues_resolved = issues.resolved_count();
            stats.active_issues = issues.active_count();
        }

        stats.workflows_succeeded = self.workflow_counters.succeeded.load(Ordering::Relaxed);
        stats.workflows_partially_succeeded = self.workflow_counters.partial.load(Ordering::Relaxed);
        stats.workflows_failed = self.workflow_counters.failed.load(Ordering::Relaxed);
        stats.workflows_superseded = self.workflow_counters.superseded.load(Ordering::Relaxed);
        stats.checkpoints_written = self.checkpoints.checkpoints_written();
        stats.persistence_failures = self.checkpoints.persistence_failures();
        stats
    }

    fn emit(&self, event: Event) {
        if let Some(events_tx) = &self.events_tx {
            if let Err(e) = events_tx.try_send(event) {
                warn!(run_id = %self.run_id, "Dropped orchestrator event: {e}");
            }
        }
    }
}
