//! Pipeline and stage state management.
//!
//! This module provides:
//! - The legal-transition table and its validator
//! - The transition engine that owns current state and history
//! - The pushdown stack of restore points layered on the engine
//! - The per-stage state registry

pub mod engine;
pub mod pushdown;
pub mod stages;
pub mod table;

pub use engine::{ChannelObserver, TransitionEngine, TransitionObserver};
pub use stages::StageStateManager;
pub use table::{StateValidator, TransitionTable, TransitionTableBuilder};
