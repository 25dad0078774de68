//! Issue models.
//!
//! An issue is an abnormal condition detected while a run executes. Issues
//! stay active until a recovery workflow succeeds or the driver resolves
//! them explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Classification of a detected problem.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// A stage exceeded its execution deadline.
    StageTimeout,

    /// A stage terminated unexpectedly.
    StageCrash,

    /// A call to the language-model backend failed.
    LlmApiFailure,

    /// A stage produced output that failed validation.
    ValidationFailure,

    /// Memory, disk, quota or similar was exhausted.
    ResourceExhausted,

    /// An upstream stage or external dependency is unavailable.
    DependencyFailure,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueType::StageTimeout => "StageTimeout",
            IssueType::StageCrash => "StageCrash",
            IssueType::LlmApiFailure => "LlmApiFailure",
            IssueType::ValidationFailure => "ValidationFailure",
            IssueType::ResourceExhausted => "ResourceExhausted",
            IssueType::DependencyFailure => "DependencyFailure",
        };
        f.write_str(name)
    }
}

/// How badly an issue affects the run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected issue instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct Issue {
    /// Unique identifier, stable for the life of the issue.
    pub id: String,

    pub issue_type: IssueType,

    /// Stage the issue originated from.
    pub stage: String,

    pub severity: Severity,

    /// Description of the most recent occurrence.
    pub message: String,

    #[ts(type = "string")]
    pub first_seen: DateTime<Utc>,

    #[ts(type = "string")]
    pub last_seen: DateTime<Utc>,

    /// How many times this issue has been detected.
    pub occurrences: u32,
}
