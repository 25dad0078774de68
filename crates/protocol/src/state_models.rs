//! Pipeline and stage state models.
//!
//! The pipeline-level machine has exactly one current [`PipelineState`] per
//! run. Stages carry their own [`StageState`] which moves independently of
//! the pipeline state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

/// Lifecycle state of a whole pipeline run.
///
/// Normal progression: Idle -> Initializing -> Running -> Completed.
///
/// Health states (Healthy, DegradedHealth, Critical) are entered from
/// Running as the ratio of failed stages changes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    /// Run created, nothing started yet.
    Idle,

    /// Run is preparing its stages.
    Initializing,

    /// Stages are executing.
    Running,

    /// Run has been suspended by the driver.
    Paused,

    /// Health check passed with no failed stages.
    Healthy,

    /// Some stages failed, below the critical threshold.
    DegradedHealth,

    /// Failed stages reached the critical threshold.
    Critical,

    /// Every stage finished successfully.
    Completed,

    /// The run was abandoned.
    Failed,
}

impl PipelineState {
    /// Every pipeline state, ordered by [`PipelineState::index`].
    pub const ALL: [PipelineState; 9] = [
        PipelineState::Idle,
        PipelineState::Initializing,
        PipelineState::Running,
        PipelineState::Paused,
        PipelineState::Healthy,
        PipelineState::DegradedHealth,
        PipelineState::Critical,
        PipelineState::Completed,
        PipelineState::Failed,
    ];

    /// Stable numeric index of this state.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Inverse of [`PipelineState::index`].
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Whether the run can make no further forward progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::Initializing => "Initializing",
            PipelineState::Running => "Running",
            PipelineState::Paused => "Paused",
            PipelineState::Healthy => "Healthy",
            PipelineState::DegradedHealth => "DegradedHealth",
            PipelineState::Critical => "Critical",
            PipelineState::Completed => "Completed",
            PipelineState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// State of an individual stage.
///
/// Stage states are not validated against any table: any state may follow
/// any other.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageState {
    Created,
    Ready,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageState::Created => "Created",
            StageState::Ready => "Ready",
            StageState::Running => "Running",
            StageState::Completed => "Completed",
            StageState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Trigger accompanying every pipeline transition attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Start,
    Initialized,
    StageCompleted,
    StageFailed,
    AllStagesCompleted,
    HealthCheckPassed,
    HealthDegraded,
    HealthCritical,
    HealthRestored,
    IssueResolved,
    Pause,
    Resume,
    Abort,
    Retry,

    /// Restoration of a saved state by the pushdown stack.
    ///
    /// Never present in a transition table.
    Rollback,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 15] = [
        EventType::Start,
        EventType::Initialized,
        EventType::StageCompleted,
        EventType::StageFailed,
        EventType::AllStagesCompleted,
        EventType::HealthCheckPassed,
        EventType::HealthDegraded,
        EventType::HealthCritical,
        EventType::HealthRestored,
        EventType::IssueResolved,
        EventType::Pause,
        EventType::Resume,
        EventType::Abort,
        EventType::Retry,
        EventType::Rollback,
    ];
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Start => "Start",
            EventType::Initialized => "Initialized",
            EventType::StageCompleted => "StageCompleted",
            EventType::StageFailed => "StageFailed",
            EventType::AllStagesCompleted => "AllStagesCompleted",
            EventType::HealthCheckPassed => "HealthCheckPassed",
            EventType::HealthDegraded => "HealthDegraded",
            EventType::HealthCritical => "HealthCritical",
            EventType::HealthRestored => "HealthRestored",
            EventType::IssueResolved => "IssueResolved",
            EventType::Pause => "Pause",
            EventType::Resume => "Resume",
            EventType::Abort => "Abort",
            EventType::Retry => "Retry",
            EventType::Rollback => "Rollback",
        };
        f.write_str(name)
    }
}

/// Immutable record of one committed pipeline transition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct StateTransition {
    /// Position of this record in the run's history, starting at 0.
    pub sequence: u64,

    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,

    pub from: PipelineState,

    pub to: PipelineState,

    pub event: EventType,

    /// Optional human-readable reason supplied by the caller.
    pub reason: Option<String>,

    /// Caller-supplied metadata captured at transition time.
    pub metadata: BTreeMap<String, String>,
}

/// A restore point saved on the pushdown stack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct StackFrame {
    pub state: PipelineState,

    pub reason: String,

    #[ts(type = "string")]
    pub saved_at: DateTime<Utc>,
}
