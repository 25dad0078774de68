//! Custom assertion helpers for integration tests.

use po_protocol::events::Event;
use po_protocol::state_models::{EventType, PipelineState, StateTransition};

/// Assert that `history` is exactly the given `(from, event, to)` steps.
#[allow(dead_code)]
pub fn assert_history(
    history: &[StateTransition],
    expected: &[(PipelineState, EventType, PipelineState)],
) {
    let actual: Vec<_> = history.iter().map(|t| (t.from, t.event, t.to)).collect();
    assert_eq!(actual, expected, "unexpected transition history");
}

/// Assert that history sequence numbers are contiguous from `first`.
#[allow(dead_code)]
pub fn assert_contiguous_sequence(history: &[StateTransition], first: u64) {
    for (offset, transition) in history.iter().enumerate() {
        assert_eq!(
            transition.sequence,
            first + offset as u64,
            "gap in history at {:?}",
            transition
        );
    }
}

/// Drain every event currently buffered in `rx`.
#[allow(dead_code)]
pub fn drain_events(rx: &mut tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Whether events contain a `WorkflowFinished` for `issue_id`.
#[allow(dead_code)]
pub fn has_workflow_finished(events: &[Event], issue_id: &str) -> bool {
    events.iter().any(|e| {
        matches!(
            e,
            Event::WorkflowFinished { execution, .. } if execution.issue_id == issue_id
        )
    })
}
