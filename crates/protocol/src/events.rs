//! Notifications emitted by the orchestration core.
//!
//! Observers receive these synchronously after a change is committed. The
//! enum uses tagged serialization so it can be forwarded to a dashboard:
//!
//! ```json
//! {
//!   "type": "transitionOccurred",
//!   "payload": {
//!     "run_id": "card-42",
//!     "transition": { "sequence": 0, "from": "IDLE", "to": "INITIALIZING", "...": "..." }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::issue_models::Issue;
use crate::state_models::StateTransition;
use crate::workflow_models::WorkflowExecution;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A pipeline transition (including a pushdown pop) was committed.
    TransitionOccurred {
        run_id: String,
        transition: StateTransition,
    },

    /// A new issue was registered.
    IssueRegistered { run_id: String, issue: Issue },

    /// An issue left the active set.
    IssueResolved { run_id: String, issue_id: String },

    /// A recovery workflow finished.
    WorkflowFinished {
        run_id: String,
        execution: WorkflowExecution,
    },
}
