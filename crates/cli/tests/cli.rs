//! End-to-end tests for the `orchestrator` binary.

use assert_cmd::Command;
use po_protocol::checkpoint_models::{PipelineSnapshot, StageRecord};
use po_protocol::state_models::{PipelineState, StageState};
use predicates::prelude::*;

fn orchestrator() -> Command {
    let mut cmd = Command::cargo_bin("orchestrator").unwrap();
    cmd.env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_table_lists_transitions() {
    orchestrator()
        .arg("table")
        .assert()
        .success()
        .stdout(predicate::str::contains("Legal transitions"))
        .stdout(predicate::str::contains("Initializing"));
}

#[test]
fn test_table_rejects_unknown_state() {
    orchestrator()
        .args(["table", "--from", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown pipeline state"));
}

#[test]
fn test_validate_lists_workflows() {
    let dir = tempfile::tempdir().unwrap();
    let workflows = dir.path().join(".orchestrator/workflows");
    std::fs::create_dir_all(&workflows).unwrap();
    std::fs::write(
        workflows.join("crash.yaml"),
        "name: restart-crashed\nissue-type: STAGE_CRASH\nactions:\n  - name: restart\n    operation: restart_stage\n",
    )
    .unwrap();

    orchestrator()
        .arg("validate")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("restart-crashed"))
        .stdout(predicate::str::contains("StageCrash"));
}

#[test]
fn test_verbose_logs_configuration_load() {
    let dir = tempfile::tempdir().unwrap();

    orchestrator()
        .args(["validate", "--verbose", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded configuration"));

    orchestrator()
        .args(["validate", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded configuration").not());
}

#[test]
fn test_validate_reports_bad_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join(".orchestrator");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "[retry\nmax-attempts = ").unwrap();

    orchestrator()
        .arg("validate")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn test_can_resume_and_inspect() {
    let dir = tempfile::tempdir().unwrap();

    orchestrator()
        .args(["can-resume", "card-1", "--root"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("no checkpoint"));

    let mut snapshot = PipelineSnapshot::new("card-1");
    snapshot.pipeline_state = PipelineState::Running;
    snapshot.history_cursor = 2;
    snapshot.upsert_stage(StageRecord::new("planning", StageState::Completed));
    snapshot.upsert_stage(StageRecord::new("development", StageState::Running));

    let checkpoints = dir.path().join(".orchestrator/checkpoints");
    std::fs::create_dir_all(&checkpoints).unwrap();
    std::fs::write(
        checkpoints.join("card-1.json"),
        serde_json::to_vec(&snapshot).unwrap(),
    )
    .unwrap();

    orchestrator()
        .args(["can-resume", "card-1", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("resumable"));

    orchestrator()
        .args(["inspect", "card-1", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending on resume: development"));

    let output = orchestrator()
        .args(["inspect", "card-1", "--json", "--root"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: PipelineSnapshot = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed, snapshot);
}
