//! Per-stage state tracking.
//!
//! Stages run concurrently, so each stage is guarded independently: the
//! registry is a sharded map keyed by stage name and updates to one stage
//! never wait on another. Stage states are not validated against the
//! pipeline transition table.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use po_protocol::checkpoint_models::StageRecord;
use po_protocol::state_models::StageState;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

struct StageEntry {
    /// Registration order, stable across updates and removals of others.
    order: u64,
    record: StageRecord,
}

/// Concurrent registry of stage name -> stage state.
#[derive(Default)]
pub struct StageStateManager {
    stages: DashMap<String, StageEntry>,
    next_order: AtomicU64,
}

impl StageStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted records, keeping their order.
    pub fn from_records(records: impl IntoIterator<Item = StageRecord>) -> Self {
        let manager = Self::new();
        for record in records {
            manager.insert(record);
        }
        manager
    }

    /// Register a stage in [`StageState::Created`]. Registering an existing
    /// stage leaves it untouched. Returns whether the stage was new.
    pub fn register_stage(&self, name: &str) -> bool {
        match self.stages.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(StageEntry {
                    order: self.next_order.fetch_add(1, Ordering::Relaxed),
                    record: StageRecord::new(name, StageState::Created),
                });
                true
            }
        }
    }

    /// Remove a stage from the registry, returning its last record.
    pub fn remove_stage(&self, name: &str) -> Option<StageRecord> {
        self.stages.remove(name).map(|(_, entry)| entry.record)
    }

    /// Move a stage to `state`, registering it first if unknown.
    ///
    /// Entering `Running` stamps the start time; entering `Completed` or
    /// `Failed` stamps the end time. A `result` replaces the stored payload.
    pub fn set_stage_state(&self, name: &str, state: StageState, result: Option<serde_json::Value>) {
        let now = Utc::now();
        let order = &self.next_order;
        let mut entry = self.stages.entry(name.to_string()).or_insert_with(|| StageEntry {
            order: order.fetch_add(1, Ordering::Relaxed),
            record: StageRecord::new(name, StageState::Created),
        });

        let record = &mut entry.record;
        let previous = record.state;
        record.state = state;
        match state {
            StageState::Running => {
                record.started_at = Some(now);
                record.ended_at = None;
            }
            StageState::Completed | StageState::Failed => {
                record.ended_at = Some(now);
            }
            StageState::Created | StageState::Ready => {}
        }
        if result.is_some() {
            record.result = result;
        }

        debug!(stage = %name, from = %previous, to = %state, "Stage state updated");
    }

    /// Store a record built elsewhere, e.g. one about to be checkpointed.
    ///
    /// Unset result and timestamps keep their stored values. Returns the
    /// merged record.
    pub fn apply_record(&self, record: StageRecord) -> StageRecord {
        let order = &self.next_order;
        let mut entry = self.stages.entry(record.name.clone()).or_insert_with(|| StageEntry {
            order: order.fetch_add(1, Ordering::Relaxed),
            record: StageRecord::new(&record.name, StageState::Created),
        });

        let stored = &mut entry.record;
        stored.state = record.state;
        if record.result.is_some() {
            stored.result = record.result;
        }
        if record.started_at.is_some() {
            stored.started_at = record.started_at;
        }
        if record.ended_at.is_some() {
            stored.ended_at = record.ended_at;
        }
        stored.clone()
    }

    pub fn get_stage_state(&self, name: &str) -> Option<StageState> {
        self.stages.get(name).map(|entry| entry.record.state)
    }

    pub fn get_stage(&self, name: &str) -> Option<StageRecord> {
        self.stages.get(name).map(|entry| entry.record.clone())
    }

    /// `(name, state)` pairs in registration order.
    pub fn list_stages(&self) -> Vec<(String, StageState)> {
        self.records()
            .into_iter()
            .map(|record| (record.name, record.state))
            .collect()
    }

    /// Full records in registration order.
    pub fn records(&self) -> Vec<StageRecord> {
        let mut entries: Vec<(u64, StageRecord)> = self
            .stages
            .iter()
            .map(|entry| (entry.order, entry.record.clone()))
            .collect();
        entries.sort_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, record)| record).collect()
    }

    pub fn count_in(&self, state: StageState) -> usize {
        self.stages
            .iter()
            .filter(|entry| entry.record.state == state)
            .count()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn insert(&self, record: StageRecord) -> bool {
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        self.stages
            .insert(record.name.clone(), StageEntry { order, record })
            .is_none()
    }
}
