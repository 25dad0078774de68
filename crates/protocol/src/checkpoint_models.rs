//! Checkpoint snapshot layout.
//!
//! One record exists per run id. It is always overwritten as a whole so that
//! a resume reads a single self-consistent document.
//!
//! # Example
//!
//! ```json
//! {
//!   "runId": "card-42",
//!   "pipelineState": "RUNNING",
//!   "stageStates": [
//!     { "name": "planning", "state": "COMPLETED", "result": {"ok": true} }
//!   ],
//!   "unresolvedIssueIds": [],
//!   "activeIssues": [],
//!   "historyCursor": 3,
//!   "savedAt": "2026-01-01T00:00:00Z"
//! }
//! ```

use crate::issue_models::Issue;
use crate::state_models::{PipelineState, StageState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Persisted view of one stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub name: String,

    pub state: StageState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    pub fn new(name: impl Into<String>, state: StageState) -> Self {
        Self {
            name: name.into(),
            state,
            result: None,
            started_at: None,
            ended_at: None,
        }
    }
}

/// The complete checkpointable state of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub run_id: String,

    pub pipeline_state: PipelineState,

    /// Stages in registration order.
    pub stage_states: Vec<StageRecord>,

    pub unresolved_issue_ids: Vec<String>,

    /// Full records of the unresolved issues, used to rehydrate the issue
    /// registry on resume.
    #[serde(default)]
    pub active_issues: Vec<Issue>,

    /// Number of history entries reflected by this snapshot.
    pub history_cursor: u64,

    #[ts(type = "string")]
    pub saved_at: DateTime<Utc>,
}

impl PipelineSnapshot {
    /// Create an empty snapshot for a run that has not started.
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline_state: PipelineState::Idle,
            stage_states: Vec::new(),
            unresolved_issue_ids: Vec::new(),
            active_issues: Vec::new(),
            history_cursor: 0,
            saved_at: Utc::now(),
        }
    }

    /// Look up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stage_states.iter().find(|s| s.name == name)
    }

    /// Names of stages that still need to run after a resume.
    pub fn pending_stages(&self) -> Vec<String> {
        self.stage_states
            .iter()
            .filter(|s| s.state != StageState::Completed)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Insert or replace a stage entry, keeping registration order.
    pub fn upsert_stage(&mut self, record: StageRecord) {
        match self.stage_states.iter_mut().find(|s| s.name == record.name) {
            Some(existing) => *existing = record,
            None => self.stage_states.push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_stages_skips_completed() {
        let mut snapshot = PipelineSnapshot::new("run-1");
        snapshot.upsert_stage(StageRecord::new("planning", StageState::Completed));
        snapshot.upsert_stage(StageRecord::new("development", StageState::Failed));
        snapshot.upsert_stage(StageRecord::new("review", StageState::Created));

        assert_eq!(snapshot.pending_stages(), vec!["development", "review"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut snapshot = PipelineSnapshot::new("run-1");
        snapshot.upsert_stage(StageRecord::new("a", StageState::Running));
        snapshot.upsert_stage(StageRecord::new("b", StageState::Running));
        snapshot.upsert_stage(StageRecord::new("a", StageState::Completed));

        assert_eq!(snapshot.stage_states.len(), 2);
        assert_eq!(snapshot.stage_states[0].name, "a");
        assert_eq!(snapshot.stage_states[0].state, StageState::Completed);
    }
}
