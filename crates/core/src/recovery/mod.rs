//! Issue-driven workflow recovery.
//!
//! This module provides:
//! - The registry of active and resolved issues
//! - Action handlers that perform individual recovery operations
//! - Registered workflows and on-demand workflow generation
//! - The executor that runs workflows with retries and deadlines

pub mod actions;
pub mod backoff;
pub mod executor;
pub mod issues;
pub mod provider;
pub mod registry;

pub use actions::{ActionError, ActionHandler, ActionRegistry, RecoveryContext};
pub use backoff::BackoffPolicy;
pub use executor::WorkflowExecutor;
pub use issues::IssueRegistry;
pub use provider::WorkflowProvider;
pub use registry::WorkflowRegistry;
