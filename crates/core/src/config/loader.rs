//! Configuration file loader for the `.orchestrator/` directory structure.
//!
//! This module loads:
//! - `config.toml`: health thresholds, retry, recovery and persistence settings
//! - `workflows/*.yaml`: statically registered recovery workflows

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use crate::config::models::OrchestratorConfig;
use po_protocol::workflow_models::Workflow;
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

/// Name of the configuration directory under a project root.
pub const CONFIG_DIR: &str = ".orchestrator";

/// Loads all configuration from the `.orchestrator/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.orchestrator/` folder
///
/// # Returns
///
/// An `AppConfig` containing all loaded configuration. Missing directories
/// or files yield defaults rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid TOML or YAML syntax
/// - Values violate a constraint (thresholds out of order, empty workflows,
///   duplicate workflow names)
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_dir = root.join(CONFIG_DIR);

    if !config_dir.exists() {
        return Ok(AppConfig::default());
    }

    let settings = load_settings(&config_dir)?;
    let workflows = load_workflows(&config_dir)?;

    Ok(AppConfig {
        settings,
        workflows,
    })
}

/// Loads orchestrator settings from `config.toml`.
fn load_settings(config_dir: &Path) -> ConfigResult<OrchestratorConfig> {
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(OrchestratorConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let settings: OrchestratorConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate_settings(&settings).map_err(|reason| ConfigError::InvalidSettings {
        path: config_path,
        reason,
    })?;

    Ok(settings)
}

fn validate_settings(settings: &OrchestratorConfig) -> Result<(), String> {
    let health = &settings.health;
    if health.degraded_threshold == 0 {
        return Err("health.degraded-threshold must be at least 1".to_string());
    }
    if health.critical_threshold < health.degraded_threshold {
        return Err(format!(
            "health.critical-threshold ({}) must not be below degraded-threshold ({})",
            health.critical_threshold, health.degraded_threshold
        ));
    }
    if settings.retry.max_attempts == 0 {
        return Err("retry.max-attempts must be at least 1".to_string());
    }
    if settings.retry.multiplier < 1.0 {
        return Err("retry.multiplier must be at least 1.0".to_string());
    }
    if settings.persistence.max_write_attempts == 0 {
        return Err("persistence.max-write-attempts must be at least 1".to_string());
    }
    Ok(())
}

/// Loads all workflow definitions from `workflows/*.yaml`.
fn load_workflows(config_dir: &Path) -> ConfigResult<Vec<Workflow>> {
    let workflows_dir = config_dir.join("workflows");

    if !workflows_dir.exists() {
        return Ok(Vec::new());
    }

    let mut workflows = Vec::new();
    let mut names = HashSet::new();

    for entry in WalkDir::new(&workflows_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: workflows_dir.clone(),
            source,
        })?;

        let path = entry.path();

        // Only process .yaml and .yml files
        let ext = path.extension().and_then(|s| s.to_str());
        if ext != Some("yaml") && ext != Some("yml") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let workflow: Workflow =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;

        if workflow.actions.is_empty() {
            return Err(ConfigError::EmptyWorkflow {
                path: path.to_path_buf(),
                name: workflow.name,
            });
        }
        if let Some(action) = workflow.actions.iter().find(|a| a.max_attempts == Some(0)) {
            return Err(ConfigError::ZeroAttempts {
                path: path.to_path_buf(),
                workflow: workflow.name.clone(),
                action: action.name.clone(),
            });
        }
        if !names.insert(workflow.name.clone()) {
            return Err(ConfigError::DuplicateWorkflow {
                path: path.to_path_buf(),
                name: workflow.name,
            });
        }

        workflows.push(workflow);
    }

    Ok(workflows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use po_protocol::issue_models::IssueType;
    use po_protocol::workflow_models::ActionPolicy;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_config_acceptance() {
        let dir = tempdir().expect("Failed to create temp dir");
        let root = dir.path();
        let config_dir = root.join(CONFIG_DIR);

        fs::create_dir_all(config_dir.join("workflows")).expect("Failed to create workflows dir");

        let config_toml = r#"
[health]
degraded-threshold = 2
critical-threshold = 4

[retry]
max-attempts = 5
base-delay-ms = 10

[recovery]
generation-enabled = false
"#;
        fs::write(config_dir.join("config.toml"), config_toml)
            .expect("Failed to write config.toml");

        let workflow_yaml = r#"name: restart-timed-out-stage
issue-type: STAGE_TIMEOUT
stage: development
timeout-ms: 60000
actions:
  - name: kill-worker
    operation: kill_process
    policy: best-effort
  - name: restart
    operation: restart_stage
    max-retries: 3
    timeout-ms: 10000
    params:
      fresh: true
"#;
        fs::write(config_dir.join("workflows/timeout.yaml"), workflow_yaml)
            .expect("Failed to write workflow file");

        let config = load_config(root).await.expect("Failed to load config");

        assert_eq!(config.settings.health.degraded_threshold, 2);
        assert_eq!(config.settings.health.critical_threshold, 4);
        assert_eq!(config.settings.retry.max_attempts, 5);
        assert_eq!(config.settings.retry.base_delay_ms, 10);
        // Unset fields keep their defaults
        assert_eq!(config.settings.retry.multiplier, 2.0);
        assert!(!config.settings.recovery.generation_enabled);
        assert_eq!(config.settings.persistence.max_write_attempts, 3);

        assert_eq!(config.workflows.len(), 1);
        let workflow = &config.workflows[0];
        assert_eq!(workflow.name, "restart-timed-out-stage");
        assert_eq!(workflow.issue_type, IssueType::StageTimeout);
        assert_eq!(workflow.stage.as_deref(), Some("development"));
        assert_eq!(workflow.actions.len(), 2);
        assert_eq!(workflow.actions[0].policy, ActionPolicy::BestEffort);
        assert_eq!(workflow.actions[1].policy, ActionPolicy::Required);
        assert_eq!(workflow.actions[1].max_attempts, Some(3));
        assert_eq!(workflow.actions[1].params["fresh"], true);
    }

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .orchestrator");

        assert_eq!(config.settings, OrchestratorConfig::default());
        assert!(config.workflows.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).expect("Failed to create .orchestrator");

        fs::write(config_dir.join("config.toml"), "[health\ndegraded = ")
            .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;
        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_thresholds_out_of_order() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(&config_dir).expect("Failed to create .orchestrator");

        fs::write(
            config_dir.join("config.toml"),
            "[health]\ndegraded-threshold = 3\ncritical-threshold = 1\n",
        )
        .expect("Failed to write config.toml");

        let result = load_config(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::InvalidSettings { reason, .. }) if reason.contains("critical-threshold")));
    }

    #[tokio::test]
    async fn test_load_config_invalid_yaml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(config_dir.join("workflows")).expect("Failed to create workflows dir");

        fs::write(config_dir.join("workflows/bad.yaml"), "name: test\n  invalid: [yaml")
            .expect("Failed to write workflow file");

        let result = load_config(dir.path()).await;
        if let Err(ConfigError::YamlParse { path, .. }) = result {
            assert!(path.ends_with("bad.yaml"));
        } else {
            panic!("Expected YamlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_rejects_duplicates_and_empty_workflows() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(config_dir.join("workflows")).expect("Failed to create workflows dir");

        let yaml = "name: same\nissue-type: STAGE_CRASH\nactions:\n  - name: a\n    operation: noop\n";
        fs::write(config_dir.join("workflows/a.yaml"), yaml).expect("write");
        fs::write(config_dir.join("workflows/b.yml"), yaml).expect("write");

        let result = load_config(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::DuplicateWorkflow { name, .. }) if name == "same"));

        fs::remove_file(config_dir.join("workflows/b.yml")).expect("remove");
        fs::write(
            config_dir.join("workflows/c.yaml"),
            "name: empty\nissue-type: STAGE_CRASH\nactions: []\n",
        )
        .expect("write");

        let result = load_config(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::EmptyWorkflow { name, path }) if name == "empty" && path.ends_with("c.yaml")));
    }

    #[tokio::test]
    async fn test_load_config_rejects_zero_attempt_action() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(config_dir.join("workflows")).expect("Failed to create workflows dir");
        fs::write(
            config_dir.join("workflows/never.yaml"),
            "name: never\nissue-type: STAGE_CRASH\nactions:\n  - name: restart\n    operation: restart_stage\n    max-attempts: 0\n",
        )
        .expect("write");

        let result = load_config(dir.path()).await;
        assert!(matches!(
            result,
            Err(ConfigError::ZeroAttempts { workflow, action, .. }) if workflow == "never" && action == "restart"
        ));
    }

    #[tokio::test]
    async fn test_load_config_ignores_non_matching_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(CONFIG_DIR);
        fs::create_dir_all(config_dir.join("workflows")).expect("Failed to create workflows dir");

        fs::write(config_dir.join("workflows/notes.txt"), "Not a yaml file").expect("write");
        fs::write(
            config_dir.join("workflows/ok.yml"),
            "name: ok\nissue-type: LLM_API_FAILURE\nactions:\n  - name: wait\n    operation: sleep\n",
        )
        .expect("write");

        let config = load_config(dir.path()).await.expect("Should ignore txt files");
        assert_eq!(config.workflows.len(), 1);
        assert_eq!(config.workflows[0].issue_type, IssueType::LlmApiFailure);
    }
}
