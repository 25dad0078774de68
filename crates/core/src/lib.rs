//! # po-core
//!
//! Orchestration core for multi-stage pipeline runs.
//!
//! This crate provides:
//! - Configuration loading from the `.orchestrator/` directory
//! - A validated pipeline state machine with a pushdown stack of restore points
//! - Concurrent per-stage state tracking
//! - Issue tracking and workflow-driven recovery with retries and deadlines
//! - Checkpoint persistence and resume
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`state`]: Transition table, transition engine, pushdown stack, stages
//! - [`recovery`]: Issues, action handlers, workflow registry and executor
//! - [`checkpoint`]: Checkpoint stores and the checkpoint manager
//! - [`health`]: Failed-stage thresholds mapped to pipeline health
//! - [`orchestrator`]: The facade a pipeline driver calls

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
