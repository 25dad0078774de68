//! Errors raised while loading `.orchestrator/`.
//!
//! Every variant names the file it came from so the CLI can point at it.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `config.toml` is not valid TOML or has fields of the wrong type.
    #[error("Failed to parse settings in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A workflow file is not valid YAML or misses a required field such
    /// as `issue-type`.
    #[error("Failed to parse workflow in {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to list workflows in {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Settings parsed but cannot drive a run: zero thresholds or attempt
    /// budgets, a critical threshold below the degraded one, a backoff
    /// multiplier below 1.
    #[error("Invalid settings in {path}: {reason}")]
    InvalidSettings { path: PathBuf, reason: String },

    /// A workflow with no actions would resolve issues without doing
    /// anything.
    #[error("Workflow '{name}' in {path} has no actions")]
    EmptyWorkflow { path: PathBuf, name: String },

    #[error("Action '{action}' of workflow '{workflow}' in {path} must allow at least one attempt")]
    ZeroAttempts {
        path: PathBuf,
        workflow: String,
        action: String,
    },

    /// Two files define a workflow with the same name.
    #[error("Duplicate workflow name '{name}' in {path}")]
    DuplicateWorkflow { path: PathBuf, name: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
