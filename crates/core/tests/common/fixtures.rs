//! Test fixtures for creating sample configurations and test data.

use po_core::config::models::{OrchestratorConfig, RetryConfig};
use po_core::Orchestrator;
use po_protocol::state_models::{EventType, PipelineState};
use po_protocol::workflow_models::{Workflow, WorkflowAction};
use po_protocol::issue_models::IssueType;
use tempfile::TempDir;

/// Create a temporary project directory with an `.orchestrator/` setup.
///
/// This creates:
/// - `.orchestrator/config.toml` with fast retries
/// - `.orchestrator/workflows/timeout.yaml` handling `STAGE_TIMEOUT`
///
/// Returns a TempDir that must be kept alive for the test duration.
#[allow(dead_code)]
pub fn create_test_project() -> std::io::Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;
    let root = temp_dir.path();

    std::fs::create_dir_all(root.join(".orchestrator/workflows"))?;

    let config_toml = r#"
[health]
degraded-threshold = 1
critical-threshold = 2

[retry]
max-attempts = 3
base-delay-ms = 5
multiplier = 2.0
max-delay-ms = 50

[persistence]
directory = ".orchestrator/checkpoints"
max-write-attempts = 2
retry-delay-ms = 1
"#;
    std::fs::write(root.join(".orchestrator/config.toml"), config_toml)?;

    let workflow_yaml = r#"
name: restart-timed-out-stage
issue-type: STAGE_TIMEOUT
timeout-ms: 2000
actions:
  - name: restart
    operation: restart_stage
    max-attempts: 2
  - name: notify
    operation: notify
    policy: best-effort
"#;
    std::fs::write(
        root.join(".orchestrator/workflows/timeout.yaml"),
        workflow_yaml,
    )?;

    Ok(temp_dir)
}

/// Settings with short retry delays so tests stay fast.
#[allow(dead_code)]
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            multiplier: 2.0,
            max_delay_ms: 100,
        },
        ..OrchestratorConfig::default()
    }
}

/// A one-action workflow for `issue_type` calling `operation`.
#[allow(dead_code)]
pub fn single_action_workflow(name: &str, issue_type: IssueType, operation: &str) -> Workflow {
    Workflow::new(name, issue_type).with_action(WorkflowAction::new(operation, operation))
}

/// Drive an orchestrator from `Idle` to `Running`.
#[allow(dead_code)]
pub fn start_run(orchestrator: &Orchestrator) {
    assert!(orchestrator.transition(PipelineState::Initializing, EventType::Start));
    assert!(orchestrator.transition(PipelineState::Running, EventType::Initialized));
}
