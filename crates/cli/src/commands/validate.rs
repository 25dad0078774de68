use color_eyre::eyre::Result;
use colored::Colorize;
use po_core::config::loader::{load_config, CONFIG_DIR};
use std::path::Path;
use tracing::debug;

pub async fn execute(root: &Path) -> Result<()> {
    let config = load_config(root).await?;
    debug!(
        root = %root.display(),
        workflows = config.workflows.len(),
        "Loaded configuration"
    );
    let settings = &config.settings;

    println!(
        "\n{} {}",
        "Configuration OK:".green().bold(),
        root.join(CONFIG_DIR).display()
    );
    println!(
        "  health       degraded >= {}, critical >= {} failed stage(s)",
        settings.health.degraded_threshold, settings.health.critical_threshold
    );
    println!(
        "  retry        {} attempt(s), {}ms x{} up to {}ms",
        settings.retry.max_attempts,
        settings.retry.base_delay_ms,
        settings.retry.multiplier,
        settings.retry.max_delay_ms
    );
    println!(
        "  recovery     workflow timeout {}ms, generation {}",
        settings.recovery.workflow_timeout_ms,
        if settings.recovery.generation_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "  persistence  {}",
        root.join(&settings.persistence.directory).display()
    );

    if config.workflows.is_empty() {
        println!("\n{}", "No workflows registered.".yellow());
        return Ok(());
    }

    println!("\n{} ({})", "Workflows".bold(), config.workflows.len());
    for workflow in &config.workflows {
        let scope = workflow
            .stage
            .as_deref()
            .map(|stage| format!(" [stage: {stage}]"))
            .unwrap_or_default();
        println!(
            "  {} -> {}{}",
            workflow.issue_type.to_string().cyan(),
            workflow.name.bold(),
            scope.dimmed()
        );
        for action in &workflow.actions {
            println!("      - {} ({})", action.name, action.operation.dimmed());
        }
    }
    println!();

    Ok(())
}
