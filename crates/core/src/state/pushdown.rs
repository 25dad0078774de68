//! Pushdown stack of restore points.
//!
//! The stack lives inside the engine's lock scope because a pop is itself a
//! transition: it restores the saved state through the same commit path,
//! records a [`EventType::Rollback`] entry in history and notifies every
//! observer. Pushing never changes the current state.

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::state::engine::{EngineInner, TransitionEngine};
use chrono::Utc;
use po_protocol::state_models::{EventType, PipelineState, StackFrame};
use std::collections::BTreeMap;
use tracing::{debug, info};

impl TransitionEngine {
    /// Save the current state as a restore point. Returns the new depth.
    pub fn push(&self, reason: impl Into<String>) -> usize {
        let mut inner = self.inner.lock();
        let frame = StackFrame {
            state: inner.current,
            reason: reason.into(),
            saved_at: Utc::now(),
        };
        debug!(
            run_id = %self.run_id(),
            state = %frame.state,
            reason = %frame.reason,
            "Pushed restore point"
        );
        inner.stack.push(frame);
        inner.stack.len()
    }

    /// Restore the most recent restore point and remove it from the stack.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::StackUnderflow`] when the stack is empty.
    pub fn pop(&self) -> OrchestratorResult<PipelineState> {
        let mut inner = self.inner.lock();
        self.pop_locked(&mut inner)
    }

    /// State saved by the most recent push, if any.
    pub fn peek(&self) -> Option<PipelineState> {
        self.inner.lock().stack.last().map(|frame| frame.state)
    }

    /// Pop until the stack holds `depth` frames, restoring every
    /// intermediate state in order.
    ///
    /// Returns `false` without changing anything when `depth` is deeper
    /// than the current stack.
    pub fn rollback_to(&self, depth: usize) -> bool {
        let mut inner = self.inner.lock();
        let start = inner.stack.len();
        if depth > start {
            return false;
        }

        while inner.stack.len() > depth {
            if self.pop_locked(&mut inner).is_err() {
                return false;
            }
        }

        info!(
            run_id = %self.run_id(),
            from_depth = start,
            to_depth = depth,
            state = %inner.current,
            "Rolled back pushdown stack"
        );
        true
    }

    pub fn stack_depth(&self) -> usize {
        self.inner.lock().stack.len()
    }

    /// Saved frames, bottom first.
    pub fn stack_frames(&self) -> Vec<StackFrame> {
        self.inner.lock().stack.clone()
    }

    fn pop_locked(&self, inner: &mut EngineInner) -> OrchestratorResult<PipelineState> {
        let frame = inner.stack.pop().ok_or(OrchestratorError::StackUnderflow)?;
        let mut metadata = BTreeMap::new();
        metadata.insert("saved_at".to_string(), frame.saved_at.to_rfc3339());

        self.record_rollback(inner);
        self.commit(
            inner,
            frame.state,
            EventType::Rollback,
            Some(frame.reason),
            metadata,
        );
        Ok(frame.state)
    }
}
