//! Legal-transition table and the validator built on it.
//!
//! The table maps `(from, event)` to exactly one target state. It is closed
//! world: any pair that was not registered is illegal. Tables are fixed once
//! built; a different table is obtained by building a new one.

use po_protocol::state_models::{EventType, PipelineState};
use std::collections::BTreeMap;

/// An immutable `(from, event) -> to` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    entries: BTreeMap<(PipelineState, EventType), PipelineState>,
}

impl TransitionTable {
    /// Start an empty table.
    pub fn builder() -> TransitionTableBuilder {
        TransitionTableBuilder::default()
    }

    /// The table used by default for every pipeline run.
    ///
    /// ```text
    /// Idle            --Start-------------> Initializing
    /// Initializing    --Initialized-------> Running
    /// Running         --HealthCheckPassed-> Healthy
    /// Running/Healthy --StageFailed-------> DegradedHealth
    /// DegradedHealth  --StageFailed-------> Critical
    /// DegradedHealth  --IssueResolved-----> Healthy
    /// Critical        --IssueResolved-----> DegradedHealth
    /// ...             --Pause/Resume------> Paused/Running
    /// ...             --Abort-------------> Failed
    /// Failed          --Retry-------------> Initializing
    /// ```
    pub fn standard() -> Self {
        use EventType as E;
        use PipelineState as S;

        let mut builder = Self::builder()
            .allow(S::Idle, E::Start, S::Initializing)
            .allow(S::Idle, E::Abort, S::Failed)
            .allow(S::Initializing, E::Initialized, S::Running)
            .allow(S::Initializing, E::StageFailed, S::Failed)
            .allow(S::Initializing, E::Abort, S::Failed)
            // Running
            .allow(S::Running, E::StageCompleted, S::Running)
            .allow(S::Running, E::StageFailed, S::DegradedHealth)
            .allow(S::Running, E::HealthCheckPassed, S::Healthy)
            .allow(S::Running, E::HealthDegraded, S::DegradedHealth)
            .allow(S::Running, E::HealthCritical, S::Critical)
            .allow(S::Running, E::AllStagesCompleted, S::Completed)
            // Healthy
            .allow(S::Healthy, E::StageCompleted, S::Healthy)
            .allow(S::Healthy, E::StageFailed, S::DegradedHealth)
            .allow(S::Healthy, E::HealthDegraded, S::DegradedHealth)
            .allow(S::Healthy, E::HealthCritical, S::Critical)
            .allow(S::Healthy, E::AllStagesCompleted, S::Completed)
            // DegradedHealth
            .allow(S::DegradedHealth, E::StageCompleted, S::DegradedHealth)
            .allow(S::DegradedHealth, E::StageFailed, S::Critical)
            .allow(S::DegradedHealth, E::HealthCritical, S::Critical)
            .allow(S::DegradedHealth, E::HealthRestored, S::Healthy)
            .allow(S::DegradedHealth, E::IssueResolved, S::Healthy)
            .allow(S::DegradedHealth, E::AllStagesCompleted, S::Completed)
            // Critical
            .allow(S::Critical, E::HealthDegraded, S::DegradedHealth)
            .allow(S::Critical, E::HealthRestored, S::Healthy)
            .allow(S::Critical, E::IssueResolved, S::DegradedHealth)
            // Paused
            .allow(S::Paused, E::Resume, S::Running)
            .allow(S::Paused, E::Abort, S::Failed)
            // Failed
            .allow(S::Failed, E::Retry, S::Initializing);

        for state in [S::Running, S::Healthy, S::DegradedHealth, S::Critical] {
            builder = builder
                .allow(state, E::Pause, S::Paused)
                .allow(state, E::Abort, S::Failed);
        }

        builder.build()
    }

    /// Target of `(from, event)`, or `None` when the pair is not registered.
    pub fn target(&self, from: PipelineState, event: EventType) -> Option<PipelineState> {
        self.entries.get(&(from, event)).copied()
    }

    /// All registered entries, ordered by source state then event.
    pub fn entries(&self) -> impl Iterator<Item = (PipelineState, EventType, PipelineState)> + '_ {
        self.entries
            .iter()
            .map(|(&(from, event), &to)| (from, event, to))
    }

    /// Events accepted from `from`.
    pub fn events_from(&self, from: PipelineState) -> Vec<EventType> {
        self.entries
            .keys()
            .filter(|(state, _)| *state == from)
            .map(|(_, event)| *event)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder for a [`TransitionTable`].
#[derive(Debug, Default)]
pub struct TransitionTableBuilder {
    entries: BTreeMap<(PipelineState, EventType), PipelineState>,
}

impl TransitionTableBuilder {
    /// Register `from --event--> to`, replacing any earlier target.
    ///
    /// [`EventType::Rollback`] entries are ignored: rollbacks are performed
    /// by the pushdown stack, never through the table.
    pub fn allow(mut self, from: PipelineState, event: EventType, to: PipelineState) -> Self {
        if event != EventType::Rollback {
            self.entries.insert((from, event), to);
        }
        self
    }

    pub fn build(self) -> TransitionTable {
        TransitionTable {
            entries: self.entries,
        }
    }
}

/// Answers whether a transition is legal. Pure lookup, no side effects.
#[derive(Debug, Clone, Default)]
pub struct StateValidator {
    table: TransitionTable,
}

impl StateValidator {
    pub fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    /// The target state reached from `from` on `event`, if legal.
    pub fn is_legal(&self, from: PipelineState, event: EventType) -> Option<PipelineState> {
        self.table.target(from, event)
    }

    /// Whether `from --event--> to` is exactly a registered entry.
    pub fn permits(&self, from: PipelineState, event: EventType, to: PipelineState) -> bool {
        self.is_legal(from, event) == Some(to)
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_start() {
        let validator = StateValidator::default();
        assert_eq!(
            validator.is_legal(PipelineState::Idle, EventType::Start),
            Some(PipelineState::Initializing)
        );
    }

    #[test]
    fn test_unregistered_pair_is_illegal() {
        let validator = StateValidator::default();
        assert_eq!(validator.is_legal(PipelineState::Completed, EventType::Start), None);
        assert_eq!(validator.is_legal(PipelineState::Idle, EventType::Resume), None);
        assert!(!validator.permits(
            PipelineState::Running,
            EventType::StageFailed,
            PipelineState::Completed
        ));
    }

    #[test]
    fn test_terminal_completed_has_no_exits() {
        let table = TransitionTable::standard();
        assert!(table.events_from(PipelineState::Completed).is_empty());
    }

    #[test]
    fn test_rollback_never_enters_table() {
        let table = TransitionTable::builder()
            .allow(PipelineState::Running, EventType::Rollback, PipelineState::Idle)
            .build();
        assert!(table.is_empty());
    }

    #[test]
    fn test_custom_table_is_closed_world() {
        let table = TransitionTable::builder()
            .allow(PipelineState::Idle, EventType::Start, PipelineState::Running)
            .build();
        let validator = StateValidator::new(table);

        assert_eq!(
            validator.is_legal(PipelineState::Idle, EventType::Start),
            Some(PipelineState::Running)
        );
        assert_eq!(
            validator.is_legal(PipelineState::Initializing, EventType::Initialized),
            None
        );
        assert_eq!(validator.table().len(), 1);
    }
}
