//! Checkpoint manager.
//!
//! Serializes snapshots to JSON, writes them through a [`CheckpointStore`]
//! with bounded retries and reads them back for resume. All writes for all
//! runs go through a single writer lock; live snapshots are taken while it
//! is held, so records reach the store in the order they were taken.

use crate::checkpoint::store::CheckpointStore;
use crate::config::models::PersistenceConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use chrono::{DateTime, Utc};
use po_protocol::checkpoint_models::{PipelineSnapshot, StageRecord};
use po_protocol::state_models::StageState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Persists and restores [`PipelineSnapshot`]s.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    max_write_attempts: u32,
    retry_delay: Duration,
    /// History cursor of the last record written per run.
    last_written: Mutex<HashMap<String, u64>>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl CheckpointManager {
    pub fn new(store: Arc<dyn CheckpointStore>, config: &PersistenceConfig) -> Self {
        Self {
            store,
            max_write_attempts: config.max_write_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            last_written: Mutex::new(HashMap::new()),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Overwrite the run's checkpoint with `snapshot`.
    ///
    /// Returns `Ok(false)` without writing when a snapshot with a later
    /// history cursor has already been written for the run.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::PersistenceWriteFailed`] once the store has
    /// failed `max_write_attempts` times in a row.
    pub async fn save_checkpoint(&self, snapshot: &PipelineSnapshot) -> OrchestratorResult<bool> {
        let mut last_written = self.last_written.lock().await;
        self.write_snapshot(&mut last_written, snapshot).await
    }

    /// Like [`CheckpointManager::save_checkpoint`], but `take_snapshot` is
    /// called only once the writer lock is held.
    ///
    /// Callers that snapshot live state use this so that the order in which
    /// records reach the store is the order in which they were taken.
    pub async fn save_checkpoint_with<F>(&self, take_snapshot: F) -> OrchestratorResult<bool>
    where
        F: FnOnce() -> PipelineSnapshot + Send,
    {
        let mut last_written = self.last_written.lock().await;
        let snapshot = take_snapshot();
        self.write_snapshot(&mut last_written, &snapshot).await
    }

    async fn write_snapshot(
        &self,
        last_written: &mut HashMap<String, u64>,
        snapshot: &PipelineSnapshot,
    ) -> OrchestratorResult<bool> {
        if let Some(&cursor) = last_written.get(&snapshot.run_id) {
            if snapshot.history_cursor < cursor {
                debug!(
                    run_id = %snapshot.run_id,
                    cursor = snapshot.history_cursor,
                    last_written = cursor,
                    "Skipping stale checkpoint"
                );
                return Ok(false);
            }
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.write_with_retry(&snapshot.run_id, &bytes).await?;
        last_written.insert(snapshot.run_id.clone(), snapshot.history_cursor);

        info!(
            run_id = %snapshot.run_id,
            state = %snapshot.pipeline_state,
            cursor = snapshot.history_cursor,
            "Checkpoint saved"
        );
        Ok(true)
    }

    /// Update one stage entry inside the run's checkpoint.
    ///
    /// Reads the current record (or starts an empty one), replaces the
    /// stage and writes the record back, all under the writer lock.
    pub async fn save_stage_checkpoint(
        &self,
        run_id: &str,
        stage: &str,
        status: StageState,
        result: Option<serde_json::Value>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) -> OrchestratorResult<()> {
        let mut last_written = self.last_written.lock().await;

        let mut snapshot = self
            .load(run_id)
            .await?
            .unwrap_or_else(|| PipelineSnapshot::new(run_id));
        snapshot.upsert_stage(StageRecord {
            name: stage.to_string(),
            state: status,
            result,
            started_at,
            ended_at,
        });
        snapshot.saved_at = Utc::now();

        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        self.write_with_retry(run_id, &bytes).await?;

        let cursor = last_written.entry(run_id.to_string()).or_default();
        *cursor = (*cursor).max(snapshot.history_cursor);

        info!(run_id = %run_id, stage = %stage, state = %status, "Stage checkpoint saved");
        Ok(())
    }

    /// Whether a checkpoint exists for `run_id`. Read errors count as no.
    pub async fn can_resume(&self, run_id: &str) -> bool {
        match self.store.read(run_id).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!(run_id = %run_id, "Failed to probe checkpoint: {e}");
                false
            }
        }
    }

    /// Read back the run's checkpoint.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NoCheckpointAvailable`] when nothing was ever
    /// written for the run.
    pub async fn resume(&self, run_id: &str) -> OrchestratorResult<PipelineSnapshot> {
        let snapshot = self
            .load(run_id)
            .await?
            .ok_or_else(|| OrchestratorError::NoCheckpointAvailable(run_id.to_string()))?;

        info!(
            run_id = %run_id,
            state = %snapshot.pipeline_state,
            cursor = snapshot.history_cursor,
            "Checkpoint loaded"
        );
        Ok(snapshot)
    }

    pub fn checkpoints_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn persistence_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn load(&self, run_id: &str) -> OrchestratorResult<Option<PipelineSnapshot>> {
        let bytes = self.store.read(run_id).await.map_err(|source| {
            OrchestratorError::PersistenceReadFailed {
                run_id: run_id.to_string(),
                source,
            }
        })?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_with_retry(&self, run_id: &str, bytes: &[u8]) -> OrchestratorResult<()> {
        let mut attempt = 1;
        loop {
            match self.store.write(run_id, bytes).await {
                Ok(()) => {
                    self.written.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(source) if attempt >= self.max_write_attempts => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        run_id = %run_id,
                        attempts = attempt,
                        "Checkpoint write failed, resume will not reflect this state: {source}"
                    );
                    return Err(OrchestratorError::PersistenceWriteFailed {
                        run_id: run_id.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    warn!(run_id = %run_id, attempt, "Checkpoint write failed, retrying: {e}");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
