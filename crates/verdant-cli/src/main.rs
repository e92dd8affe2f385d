//! Verdant - Repo Gardening Pipelines CLI
//!
//! The `verdant` command inspects the durable state of gardening runs.
//!
//! ## Commands
//!
//! - `migrate`: Initialize the database schema
//! - `runs`: List recorded workflow runs
//! - `replay`: Verify a run's journal and summarize it
//! - `draft`: Show the pending draft proposal for a repository

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::Level;

use verdant_core::replay_inspect;
use verdant_state::{
    init_schema, DraftStore, RunId, RunStatus, SurrealDraftStore, SurrealJournal, WorkflowJournal,
};

#[derive(Parser)]
#[command(name = "verdant")]
#[command(author = "Verdant Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Durable repo gardening pipelines", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Migrate,

    /// List recorded workflow runs, newest first
    Runs {
        /// Only show runs of one workflow (analysis, batch_gardening, janitor, portfolio)
        #[arg(short, long)]
        workflow: Option<String>,

        /// Maximum number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Verify a run's journal and summarize it
    Replay {
        /// Run ID to inspect
        run: String,

        /// Print the full event log
        #[arg(long)]
        events: bool,
    },

    /// Show the pending draft proposal for a repository
    Draft {
        /// Repository id
        repo: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    verdant_core::init_tracing(cli.json, level);

    // Initialize database connection
    let db = verdant_state::connect_from_env()
        .await
        .context("Failed to connect to Verdant database")?;

    match cli.command {
        Commands::Migrate => cmd_migrate(&db).await,
        Commands::Runs { workflow, limit } => {
            let journal = SurrealJournal::new(db);
            cmd_runs(&journal, workflow.as_deref(), limit).await
        }
        Commands::Replay { run, events } => {
            let journal = SurrealJournal::new(db);
            cmd_replay(&journal, &run, events).await
        }
        Commands::Draft { repo } => {
            let drafts = SurrealDraftStore::new(db);
            cmd_draft(&drafts, repo).await
        }
    }
}

/// Apply the database schema. Safe to run repeatedly.
async fn cmd_migrate(db: &Surreal<Any>) -> Result<()> {
    init_schema(db)
        .await
        .context("Failed to initialize database schema")?;

    println!("Database schema initialized.");
    Ok(())
}

/// List recorded workflow runs
async fn cmd_runs(journal: &SurrealJournal, workflow: Option<&str>, limit: usize) -> Result<()> {
    let runs = journal.list_runs(workflow).await?;

    if runs.is_empty() {
        match workflow {
            Some(name) => println!("No runs found for workflow '{}'", name),
            None => println!("No runs found."),
        }
        return Ok(());
    }

    for record in runs.iter().take(limit) {
        let subject = record.metadata.subject.as_deref().unwrap_or("-");
        println!(
            "{}  {:<16} {:<9} {}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.metadata.workflow,
            status_label(&record.status),
            record.run_id,
            subject
        );
    }

    Ok(())
}

/// Verify a run's journal and print what the inspection found
async fn cmd_replay(journal: &SurrealJournal, run: &str, show_events: bool) -> Result<()> {
    let run_id = RunId(run.to_string());
    let (events, summary) = replay_inspect(journal, &run_id)
        .await
        .with_context(|| format!("Replay failed for run: {}", run))?;

    println!("Run:      {}", summary.run_id);
    println!("Workflow: {}", summary.workflow);
    println!("Status:   {}", status_label(&summary.status));
    println!("Events:   {}", summary.event_count);
    println!("Journal digest: {}", summary.replay_digest.short());
    println!("Input digest:   {}", summary.input_digest.short());

    if show_events {
        println!();
        for event in &events {
            println!(
                "  [{:>3}] {} {:<16} {}",
                event.seq,
                event.timestamp.format("%H:%M:%S%.3f"),
                event.kind,
                truncate(&serde_json::to_string(&event.payload)?, 60)
            );
        }
    }

    Ok(())
}

/// Show the pending draft proposal for a repository
async fn cmd_draft(drafts: &SurrealDraftStore, repo: u64) -> Result<()> {
    let draft = drafts.load_draft(repo).await?;

    match draft {
        Some(draft) => {
            println!(
                "Draft for repository {} (updated {})",
                draft.repo_id,
                draft.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            for (filename, content) in &draft.files {
                println!("  {} ({} bytes)", filename, content.len());
            }
        }
        None => println!("No pending draft for repository {}", repo),
    }

    Ok(())
}

fn status_label(status: &RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

/// Truncate a string for display
fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
