use color_eyre::eyre::Result;
use colored::Colorize;
use po_core::checkpoint::{CheckpointManager, FileCheckpointStore};
use po_core::config::loader::load_config;
use po_protocol::state_models::StageState;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

async fn manager(root: &Path) -> Result<CheckpointManager> {
    let config = load_config(root).await?;
    let persistence = config.settings.persistence;
    let directory = root.join(&persistence.directory);
    debug!(directory = %directory.display(), "Using checkpoint directory");
    let store = FileCheckpointStore::new(directory);
    Ok(CheckpointManager::new(Arc::new(store), &persistence))
}

pub async fn can_resume(root: &Path, run_id: &str) -> Result<bool> {
    let resumable = manager(root).await?.can_resume(run_id).await;
    if resumable {
        println!("{} {run_id}", "resumable:".green().bold());
    } else {
        println!("{} {run_id}", "no checkpoint:".yellow().bold());
    }
    Ok(resumable)
}

pub async fn execute(root: &Path, run_id: &str, json: bool) -> Result<()> {
    let snapshot = manager(root).await?.resume(run_id).await?;
    debug!(
        run_id = %run_id,
        stages = snapshot.stage_states.len(),
        cursor = snapshot.history_cursor,
        "Read checkpoint"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("\n{} {}", "Run".bold(), snapshot.run_id.cyan());
    println!("  state     {}", snapshot.pipeline_state);
    println!("  history   {} transition(s)", snapshot.history_cursor);
    println!("  saved at  {}", snapshot.saved_at.to_rfc3339());

    println!("\n{}", "Stages".bold());
    for stage in &snapshot.stage_states {
        let state = match stage.state {
            StageState::Completed => stage.state.to_string().green(),
            StageState::Failed => stage.state.to_string().red(),
            StageState::Running => stage.state.to_string().yellow(),
            _ => stage.state.to_string().normal(),
        };
        println!("  {:<24} {}", stage.name, state);
    }

    let pending = snapshot.pending_stages();
    if !pending.is_empty() {
        println!("\n{} {}", "Pending on resume:".bold(), pending.join(", "));
    }

    if !snapshot.active_issues.is_empty() {
        println!("\n{}", "Unresolved issues".red().bold());
        for issue in &snapshot.active_issues {
            println!(
                "  {} {} on {} (x{}): {}",
                issue.id.dimmed(),
                issue.issue_type,
                issue.stage,
                issue.occurrences,
                issue.message
            );
        }
    }
    println!();

    Ok(())
}
