//! Configuration loading and management.
//!
//! This module provides functionality to load and parse all configuration files
//! from the `.orchestrator/` directory structure.

pub mod error;
pub mod loader;
pub mod models;
