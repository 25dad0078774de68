use color_eyre::eyre::{eyre, Result};
use colored::Colorize;
use po_core::state::TransitionTable;
use po_protocol::state_models::PipelineState;

pub fn execute(from: Option<&str>) -> Result<()> {
    let table = TransitionTable::standard();
    let filter = from.map(parse_state).transpose()?;

    let rows: Vec<_> = table
        .entries()
        .filter(|(state, _, _)| filter.map_or(true, |wanted| *state == wanted))
        .collect();

    println!(
        "\n{} ({})",
        "Legal transitions".green().bold(),
        rows.len()
    );
    println!("{}", "─".repeat(56).dimmed());
    println!(
        "{:<16} {:<20} {:<16}",
        "FROM".bold(),
        "EVENT".bold(),
        "TO".bold()
    );
    println!("{}", "─".repeat(56).dimmed());

    for (from, event, to) in rows {
        let to_colored = match to {
            PipelineState::Failed | PipelineState::Critical => to.to_string().red(),
            PipelineState::DegradedHealth | PipelineState::Paused => to.to_string().yellow(),
            PipelineState::Completed | PipelineState::Healthy => to.to_string().green(),
            _ => to.to_string().normal(),
        };
        println!("{:<16} {:<20} {:<16}", from.to_string(), event.to_string(), to_colored);
    }
    println!();

    Ok(())
}

/// Accepts `RUNNING`, `running` or `degraded_health` style names.
fn parse_state(name: &str) -> Result<PipelineState> {
    serde_json::from_value(serde_json::Value::String(name.to_ascii_uppercase()))
        .map_err(|_| eyre!("Unknown pipeline state: {name}"))
}
