//! Checkpoint persistence and resume.
//!
//! A checkpoint is a complete [`PipelineSnapshot`](po_protocol::checkpoint_models::PipelineSnapshot)
//! of one run, overwritten as a whole on every save. The storage technology
//! is pluggable through [`CheckpointStore`].

pub mod manager;
pub mod store;

pub use manager::CheckpointManager;
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
