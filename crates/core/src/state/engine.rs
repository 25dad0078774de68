//! Pipeline transition engine.
//!
//! [`TransitionEngine`] is the only component allowed to change the current
//! pipeline state. Every mutation runs under one exclusive lock scoped to
//! the run, while reads of the current state go through an atomic mirror
//! and never block.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::state::table::StateValidator;
use chrono::Utc;
use parking_lot::Mutex;
use po_protocol::events::Event;
use po_protocol::state_models::{EventType, PipelineState, StackFrame, StateTransition};
use po_protocol::stats_models::OrchestratorStats;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Listener for committed transitions.
///
/// Observers are invoked synchronously, in registration order, while the
/// engine lock is held. They must not call back into the engine's mutating
/// or history methods; [`TransitionEngine::current_state`] is safe.
pub trait TransitionObserver: Send + Sync {
    fn on_transition(&self, run_id: &str, transition: &StateTransition) -> anyhow::Result<()>;
}

/// Observer that forwards each transition to an event channel.
///
/// Uses `try_send` so a slow consumer can never stall the engine; a full
/// channel is reported as an observer failure.
pub struct ChannelObserver {
    events_tx: mpsc::Sender<Event>,
}

impl ChannelObserver {
    pub fn new(events_tx: mpsc::Sender<Event>) -> Self {
        Self { events_tx }
    }
}

impl TransitionObserver for ChannelObserver {
    fn on_transition(&self, run_id: &str, transition: &StateTransition) -> anyhow::Result<()> {
        self.events_tx
            .try_send(Event::TransitionOccurred {
                run_id: run_id.to_string(),
                transition: transition.clone(),
            })
            .map_err(|e| anyhow::anyhow!("event channel rejected transition: {e}"))
    }
}

/// Mutable engine state, guarded by [`TransitionEngine::inner`].
pub(super) struct EngineInner {
    pub(super) current: PipelineState,
    pub(super) entered_at: Instant,
    pub(super) history: Vec<StateTransition>,
    pub(super) stack: Vec<StackFrame>,
    pub(super) rollback_epoch: u64,
    counters: EngineCounters,
}

#[derive(Default)]
struct EngineCounters {
    total: u64,
    rejected: u64,
    rollbacks: u64,
    by_event: BTreeMap<EventType, u64>,
    dwell: BTreeMap<PipelineState, Duration>,
}

/// Applies validated transitions and owns the transition history.
pub struct TransitionEngine {
    run_id: String,
    validator: StateValidator,
    observers: Vec<Arc<dyn TransitionObserver>>,
    /// Sequence number of the first history entry held in memory.
    sequence_base: u64,
    current: AtomicU8,
    pub(super) inner: Mutex<EngineInner>,
}

impl TransitionEngine {
    /// Create an engine for a fresh run, starting at [`PipelineState::Idle`].
    pub fn new(
        run_id: impl Into<String>,
        validator: StateValidator,
        observers: Vec<Arc<dyn TransitionObserver>>,
    ) -> Self {
        Self::resumed(run_id, validator, observers, PipelineState::Idle, 0)
    }

    /// Create an engine continuing a run restored from a checkpoint.
    ///
    /// `history_cursor` is the number of transitions already persisted; new
    /// history entries are numbered from there.
    pub fn resumed(
        run_id: impl Into<String>,
        validator: StateValidator,
        observers: Vec<Arc<dyn TransitionObserver>>,
        state: PipelineState,
        history_cursor: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            validator,
            observers,
            sequence_base: history_cursor,
            current: AtomicU8::new(state.index()),
            inner: Mutex::new(EngineInner {
                current: state,
                entered_at: Instant::now(),
                history: Vec::new(),
                stack: Vec::new(),
                rollback_epoch: 0,
                counters: EngineCounters::default(),
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn validator(&self) -> &StateValidator {
        &self.validator
    }

    /// Current state, read without taking the engine lock.
    pub fn current_state(&self) -> PipelineState {
        PipelineState::from_index(self.current.load(Ordering::Acquire))
            .unwrap_or(PipelineState::Idle)
    }

    /// Target reached from the current state on `event`, if legal.
    pub fn is_legal(&self, event: EventType) -> Option<PipelineState> {
        self.validator.is_legal(self.current_state(), event)
    }

    /// Attempt `current --event--> to`. Returns whether it was committed.
    pub fn transition(&self, to: PipelineState, event: EventType) -> bool {
        self.transition_with(to, event, None, BTreeMap::new())
    }

    /// [`TransitionEngine::transition`] with a reason and metadata snapshot.
    pub fn transition_with(
        &self,
        to: PipelineState,
        event: EventType,
        reason: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> bool {
        self.try_transition(to, event, reason, metadata).is_ok()
    }

    /// Attempt a transition, returning the committed record or the reason
    /// it was rejected. A rejection leaves every piece of state untouched.
    pub fn try_transition(
        &self,
        to: PipelineState,
        event: EventType,
        reason: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> OrchestratorResult<StateTransition> {
        let mut inner = self.inner.lock();
        let from = inner.current;

        // A resolved target that differs from the requested one means the
        // caller acted on a stale view of the state.
        if !self.validator.permits(from, event, to) {
            inner.counters.rejected += 1;
            warn!(
                run_id = %self.run_id,
                %from, %event, requested = %to,
                "Rejected illegal transition"
            );
            return Err(OrchestratorError::IllegalTransition {
                from,
                event,
                requested: to,
            });
        }

        Ok(self.commit(&mut inner, to, event, reason, metadata))
    }

    /// Record a transition, move the current state and notify observers.
    ///
    /// Callers must have validated the move (or be the pushdown stack).
    pub(super) fn commit(
        &self,
        inner: &mut EngineInner,
        to: PipelineState,
        event: EventType,
        reason: Option<String>,
        metadata: BTreeMap<String, String>,
    ) -> StateTransition {
        let now = Instant::now();
        let from = inner.current;
        let transition = StateTransition {
            sequence: self.sequence_base + inner.history.len() as u64,
            timestamp: Utc::now(),
            from,
            to,
            event,
            reason,
            metadata,
        };

        let dwell = now.saturating_duration_since(inner.entered_at);
        *inner.counters.dwell.entry(from).or_default() += dwell;
        *inner.counters.by_event.entry(event).or_default() += 1;
        inner.counters.total += 1;
        inner.entered_at = now;
        inner.current = to;
        inner.history.push(transition.clone());
        self.current.store(to.index(), Ordering::Release);

        info!(
            run_id = %self.run_id,
            sequence = transition.sequence,
            %from, %to, %event,
            "Pipeline transition committed"
        );

        self.notify(&transition);
        transition
    }

    pub(super) fn record_rollback(&self, inner: &mut EngineInner) {
        inner.counters.rollbacks += 1;
        inner.rollback_epoch += 1;
    }

    fn notify(&self, transition: &StateTransition) {
        for (index, observer) in self.observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| {
                observer.on_transition(&self.run_id, transition)
            })) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(run_id = %self.run_id, observer = index, "Transition observer failed: {e:#}");
                }
                Err(_) => {
                    error!(run_id = %self.run_id, observer = index, "Transition observer panicked");
                }
            }
        }
        debug!(
            run_id = %self.run_id,
            observers = self.observers.len(),
            "Transition observers notified"
        );
    }

    /// Full in-memory history in commit order.
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner.lock().history.clone()
    }

    /// Number of transitions committed over the life of the run, including
    /// those that preceded a resume.
    pub fn history_cursor(&self) -> u64 {
        self.sequence_base + self.inner.lock().history.len() as u64
    }

    /// Current state and history cursor read under one lock acquisition,
    /// so they always describe the same committed point.
    pub fn committed_view(&self) -> (PipelineState, u64) {
        let inner = self.inner.lock();
        (
            inner.current,
            self.sequence_base + inner.history.len() as u64,
        )
    }

    /// Incremented on every pushdown pop.
    pub fn rollback_epoch(&self) -> u64 {
        self.inner.lock().rollback_epoch
    }

    /// Copy the engine's counters into `stats`.
    pub fn fill_stats(&self, stats: &mut OrchestratorStats) {
        let inner = self.inner.lock();
        stats.total_transitions = inner.counters.total;
        stats.rejected_transitions = inner.counters.rejected;
        stats.rollbacks = inner.counters.rollbacks;
        stats.transitions_by_event = inner.counters.by_event.clone();

        let mut time_in_state: BTreeMap<PipelineState, u64> = inner
            .counters
            .dwell
            .iter()
            .map(|(state, dwell)| (*state, dwell.as_millis() as u64))
            .collect();
        let live = inner.entered_at.elapsed().as_millis() as u64;
        *time_in_state.entry(inner.current).or_default() += live;
        stats.time_in_state_ms = time_in_state;
    }
}
