//! # po-protocol
//!
//! Shared data models for pipeline-orchestrator.
//!
//! This crate defines every structure that crosses a boundary of the
//! orchestration core:
//! - Pipeline and stage state machines, events and transition records
//! - Issues detected while a run executes
//! - Recovery workflows and the records of their executions
//! - Checkpoint snapshots written to durable storage
//! - Notifications delivered to transition observers
//!
//! ## Modules
//!
//! - [`state_models`]: Pipeline/stage states, events, transition history
//! - [`issue_models`]: Issue classification and issue instances
//! - [`workflow_models`]: Recovery workflows and execution records
//! - [`checkpoint_models`]: Persisted snapshot layout
//! - [`stats_models`]: Aggregate counters
//! - [`events`]: Observer notifications
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs and chrono
//! - TypeScript generation: all types derive `TS` for dashboard clients
//! - Independent compilation: no dependencies on other orchestrator crates

pub mod checkpoint_models;
pub mod events;
pub mod issue_models;
pub mod state_models;
pub mod stats_models;
pub mod workflow_models;

// Re-export all public types for convenience
pub use checkpoint_models::*;
pub use events::*;
pub use issue_models::*;
pub use state_models::*;
pub use stats_models::*;
pub use workflow_models::*;
