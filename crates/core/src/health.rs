//! Failed-stage thresholds that drive pipeline health.
//!
//! The stage registry has no opinion about pipeline health. This policy
//! compares failed and total stage counts and tells the caller which health
//! state the pipeline should be in; the caller then drives the transition.

use crate::config::models::HealthConfig;
use po_protocol::state_models::{EventType, PipelineState};

/// Health verdict for a set of stage counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    /// Pipeline state matching this verdict.
    pub fn target_state(self) -> PipelineState {
        match self {
            HealthStatus::Healthy => PipelineState::Healthy,
            HealthStatus::Degraded => PipelineState::DegradedHealth,
            HealthStatus::Critical => PipelineState::Critical,
        }
    }

    /// Event that moves the pipeline from `current` towards this verdict.
    ///
    /// `None` when the pipeline already reflects the verdict.
    pub fn event_from(self, current: PipelineState) -> Option<EventType> {
        match (self, current) {
            (HealthStatus::Healthy, PipelineState::Healthy)
            | (HealthStatus::Degraded, PipelineState::DegradedHealth)
            | (HealthStatus::Critical, PipelineState::Critical) => None,
            (HealthStatus::Healthy, PipelineState::Running) => Some(EventType::HealthCheckPassed),
            (HealthStatus::Healthy, _) => Some(EventType::HealthRestored),
            (HealthStatus::Degraded, _) => Some(EventType::HealthDegraded),
            (HealthStatus::Critical, _) => Some(EventType::HealthCritical),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPolicy {
    degraded_threshold: usize,
    critical_threshold: usize,
}

impl HealthPolicy {
    pub fn new(degraded_threshold: usize, critical_threshold: usize) -> Self {
        let degraded_threshold = degraded_threshold.max(1);
        Self {
            degraded_threshold,
            critical_threshold: critical_threshold.max(degraded_threshold),
        }
    }

    /// Verdict for `failed` failed stages out of `total` registered.
    pub fn evaluate(&self, failed: usize, total: usize) -> HealthStatus {
        if total == 0 {
            HealthStatus::Healthy
        } else if failed >= self.critical_threshold {
            HealthStatus::Critical
        } else if failed >= self.degraded_threshold {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        HealthConfig::default().into()
    }
}

impl From<HealthConfig> for HealthPolicy {
    fn from(config: HealthConfig) -> Self {
        Self::new(config.degraded_threshold, config.critical_threshold)
    }
}
