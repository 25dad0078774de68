//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines the
//! orchestrator settings from `config.toml` with the statically registered
//! recovery workflows from `workflows/*.yaml`.

use po_protocol::workflow_models::Workflow;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings from `.orchestrator/config.toml`.
///
/// # Example
///
/// ```toml
/// [health]
/// degraded-threshold = 1
/// critical-threshold = 3
///
/// [retry]
/// max-attempts = 3
/// base-delay-ms = 200
/// multiplier = 2.0
/// max-delay-ms = 5000
///
/// [recovery]
/// workflow-timeout-ms = 300000
/// generation-enabled = true
///
/// [persistence]
/// directory = ".orchestrator/checkpoints"
/// max-write-attempts = 3
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct OrchestratorConfig {
    pub health: HealthConfig,
    pub retry: RetryConfig,
    pub recovery: RecoveryConfig,
    pub persistence: PersistenceConfig,
}

/// Thresholds mapping failed-stage counts to pipeline health.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct HealthConfig {
    /// Failed stages at or above this count mean `DegradedHealth`.
    pub degraded_threshold: usize,

    /// Failed stages at or above this count mean `Critical`.
    pub critical_threshold: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            degraded_threshold: 1,
            critical_threshold: 3,
        }
    }
}

/// Default retry budget and backoff curve for workflow actions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Attempts per action when the action does not set its own budget.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 5_000,
        }
    }
}

/// Workflow execution and generation settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RecoveryConfig {
    /// Overall deadline for a workflow that does not set its own.
    pub workflow_timeout_ms: u64,

    /// Deadline for a single action attempt that does not set its own.
    pub action_timeout_ms: u64,

    /// Deadline for the workflow provider.
    pub generation_timeout_ms: u64,

    /// Whether the workflow provider is consulted at all.
    pub generation_enabled: bool,

    /// Register generated workflows so later issues reuse them.
    pub cache_generated: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            workflow_timeout_ms: 300_000,
            action_timeout_ms: 60_000,
            generation_timeout_ms: 30_000,
            generation_enabled: true,
            cache_generated: false,
        }
    }
}

impl RecoveryConfig {
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

/// Checkpoint storage settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct PersistenceConfig {
    /// Directory for file-backed checkpoints, relative to the project root.
    pub directory: PathBuf,

    pub max_write_attempts: u32,

    pub retry_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".orchestrator/checkpoints"),
            max_write_attempts: 3,
            retry_delay_ms: 100,
        }
    }
}

/// Unified application configuration loaded from `.orchestrator/`.
///
/// # Example
///
/// ```rust,no_run
/// use po_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} workflows", config.workflows.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Settings from `config.toml`.
    pub settings: OrchestratorConfig,

    /// Workflows loaded from `workflows/*.yaml`, sorted by file name.
    pub workflows: Vec<Workflow>,
}
