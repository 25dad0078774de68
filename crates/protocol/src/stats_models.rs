//! Aggregate counters reported by the orchestrator.

use crate::state_models::{EventType, PipelineState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct OrchestratorStats {
    pub total_transitions: u64,

    pub rejected_transitions: u64,

    pub rollbacks: u64,

    pub transitions_by_event: BTreeMap<EventType, u64>,

    /// Milliseconds spent in each state, including the live dwell of the
    /// current state.
    pub time_in_state_ms: BTreeMap<PipelineState, u64>,

    pub issues_registered: u64,

    pub issues_resolved: u64,

    pub active_issues: u64,

    pub workflows_succeeded: u64,

    pub workflows_partially_succeeded: u64,

    pub workflows_failed: u64,

    /// Successful executions discarded because the pipeline rolled back
    /// while they ran. Not counted as succeeded.
    #[serde(default)]
    pub workflows_superseded: u64,

    pub checkpoints_written: u64,

    pub persistence_failures: u64,
}
