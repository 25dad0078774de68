//! `orchestrator` command-line tool.
//!
//! Inspects the transition table, validates a project's `.orchestrator/`
//! configuration and reads checkpoints left behind by pipeline runs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Pipeline orchestration core tooling", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Project root containing `.orchestrator/`
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the legal-transition table
    Table {
        /// Only show transitions out of this state (e.g. RUNNING)
        #[arg(long)]
        from: Option<String>,
    },

    /// Load `.orchestrator/` and list its settings and workflows
    Validate,

    /// Print the checkpoint of a run
    Inspect {
        /// Run id
        run_id: String,

        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a run can be resumed (exit code 1 if not)
    CanResume {
        /// Run id
        run_id: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Table { from } => commands::table::execute(from.as_deref())?,
        Commands::Validate => commands::validate::execute(&args.root).await?,
        Commands::Inspect { run_id, json } => {
            commands::inspect::execute(&args.root, &run_id, json).await?
        }
        Commands::CanResume { run_id } => {
            if !commands::inspect::can_resume(&args.root, &run_id).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
