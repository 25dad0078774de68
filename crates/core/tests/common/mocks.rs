//! Mock collaborators for deterministic testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use po_core::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use po_core::recovery::{ActionError, ActionHandler, RecoveryContext, WorkflowProvider};
use po_core::state::TransitionObserver;
use po_protocol::state_models::StateTransition;
use po_protocol::workflow_models::{Workflow, WorkflowAction};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observer that records every transition it sees.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<StateTransition>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transitions(&self) -> Vec<StateTransition> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

impl TransitionObserver for RecordingObserver {
    fn on_transition(&self, _run_id: &str, transition: &StateTransition) -> anyhow::Result<()> {
        self.seen.lock().push(transition.clone());
        Ok(())
    }
}

/// Observer that always fails.
#[allow(dead_code)]
pub struct BrokenObserver;

impl TransitionObserver for BrokenObserver {
    fn on_transition(&self, _run_id: &str, _transition: &StateTransition) -> anyhow::Result<()> {
        anyhow::bail!("dashboard offline")
    }
}

/// Action handler returning a scripted sequence of results.
///
/// Once the script runs out the last entry repeats.
#[allow(dead_code)]
pub struct ScriptedHandler {
    script: Vec<Result<serde_json::Value, ActionError>>,
    calls: AtomicU32,
    delay: Duration,
}

#[allow(dead_code)]
impl ScriptedHandler {
    pub fn new(script: Vec<Result<serde_json::Value, ActionError>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        })
    }

    /// Always succeeds.
    pub fn succeeding() -> Arc<Self> {
        Self::new(vec![Ok(serde_json::json!({ "ok": true }))])
    }

    /// Always fails transiently.
    pub fn transient_failure() -> Arc<Self> {
        Self::new(vec![Err(ActionError::Transient("service busy".to_string()))])
    }

    /// Sleeps `delay` before each call, then succeeds.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: vec![Ok(serde_json::json!({ "ok": true }))],
            calls: AtomicU32::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for ScriptedHandler {
    async fn execute(
        &self,
        _action: &WorkflowAction,
        _context: &RecoveryContext,
    ) -> Result<serde_json::Value, ActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let index = call.min(self.script.len().saturating_sub(1));
        self.script
            .get(index)
            .cloned()
            .unwrap_or_else(|| Err(ActionError::Permanent("empty script".to_string())))
    }
}

/// Provider that never has a workflow.
#[allow(dead_code)]
pub struct NullProvider;

#[async_trait]
impl WorkflowProvider for NullProvider {
    async fn generate(&self, _context: &RecoveryContext) -> anyhow::Result<Option<Workflow>> {
        Ok(None)
    }
}

/// Provider that returns a fixed workflow and counts calls.
#[allow(dead_code)]
pub struct FixedProvider {
    workflow: Workflow,
    calls: AtomicU32,
}

#[allow(dead_code)]
impl FixedProvider {
    pub fn new(workflow: Workflow) -> Arc<Self> {
        Arc::new(Self {
            workflow,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkflowProvider for FixedProvider {
    async fn generate(&self, _context: &RecoveryContext) -> anyhow::Result<Option<Workflow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.workflow.clone()))
    }
}

/// Store whose writes can be switched off.
#[allow(dead_code)]
#[derive(Default)]
pub struct SwitchableStore {
    failing: AtomicBool,
    inner: MemoryCheckpointStore,
}

#[allow(dead_code)]
impl SwitchableStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckpointStore for SwitchableStore {
    async fn write(&self, run_id: &str, bytes: &[u8]) -> std::io::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("read-only file system"));
        }
        self.inner.write(run_id, bytes).await
    }

    async fn read(&self, run_id: &str) -> std::io::Result<Option<Vec<u8>>> {
        self.inner.read(run_id).await
    }
}
