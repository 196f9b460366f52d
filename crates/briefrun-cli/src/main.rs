//! BriefRun CLI - Command line interface for the BriefRun control plane.

mod client;
mod error;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use briefrun_core::{DispatchState, Priority, ResultStatus, RunView, UsageSnapshot};

use crate::client::Client;

/// BriefRun CLI - submit briefings and follow their runs
#[derive(Parser)]
#[command(name = "briefrun")]
#[command(about = "CLI for the BriefRun control plane", long_about = None)]
struct Cli {
    /// Control plane address
    #[arg(short, long, env = "BRIEFRUN_ADDR", default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a briefing
    Submit {
        /// Briefing text
        text: String,

        /// Priority inherited by every task
        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// Submitting user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Get run status
    Status {
        /// Run ID
        run_id: String,
    },

    /// Get raw results reported for a run
    Results {
        /// Run ID
        run_id: String,
    },

    /// Report a task result as a worker would
    Report {
        /// Task ID
        task_id: String,

        /// Completion status
        #[arg(short, long, default_value = "completed")]
        status: ResultStatus,

        /// Extra result fields as a JSON object
        #[arg(short, long)]
        result: Option<String>,
    },

    /// Show quota usage
    Stats,

    /// Check control plane health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::new(&cli.addr);

    match cli.command {
        Commands::Submit { text, priority, user } => {
            let receipt = client.submit(&text, priority, user.as_deref()).await?;
            if cli.json {
                print_json(&receipt)?;
            } else {
                print_receipt(&receipt);
            }
        }
        Commands::Status { run_id } => {
            let run = client.run(&run_id).await?;
            if cli.json {
                print_json(&run)?;
            } else {
                print_run(&run);
            }
        }
        Commands::Results { run_id } => {
            let results = client.results(&run_id).await?;
            print_json(&results)?;
        }
        Commands::Report {
            task_id,
            status,
            result,
        } => {
            let payload = build_payload(status, result.as_deref())?;
            let response = client.report(&task_id, &payload).await?;
            if cli.json {
                print_json(&response)?;
            } else {
                println!(
                    "Result {} for {} (run {} is {})",
                    response["ingestion"].as_str().unwrap_or("accepted"),
                    task_id,
                    response["run_id"].as_str().unwrap_or("?"),
                    response["run_status"].as_str().unwrap_or("?"),
                );
            }
        }
        Commands::Stats => {
            let usage = client.stats().await?;
            if cli.json {
                print_json(&usage)?;
            } else {
                print_usage(&usage);
            }
        }
        Commands::Health => {
            if client.health().await? {
                println!("Control plane at {} is healthy", cli.addr);
            } else {
                return Err(format!("control plane at {} is unhealthy", cli.addr).into());
            }
        }
    }

    Ok(())
}

/// Merge `--status` into the optional `--result` object.
fn build_payload(status: ResultStatus, extra: Option<&str>) -> Result<Value, String> {
    let mut payload = match extra {
        Some(raw) => serde_json::from_str::<Value>(raw).map_err(|e| format!("invalid --result JSON: {e}"))?,
        None => Value::Object(Default::default()),
    };

    let Some(fields) = payload.as_object_mut() else {
        return Err("--result must be a JSON object".to_string());
    };
    fields.insert("status".into(), Value::from(status.as_str()));
    Ok(payload)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_receipt(receipt: &Value) {
    println!("Run created:");
    println!("  ID:          {}", receipt["run_id"].as_str().unwrap_or("?"));
    println!("  Status:      {}", receipt["status"].as_str().unwrap_or("?"));
    println!(
        "  Dispatched:  {}/{}",
        receipt["dispatched_task_count"], receipt["tasks_count"]
    );
    println!(
        "  ETA:         {}",
        receipt["estimated_completion"].as_str().unwrap_or("?")
    );
}

fn print_run(run: &RunView) {
    println!("  ID:         {}", run.run_id);
    println!("  Status:     {}", run.status.as_str().to_uppercase());
    println!("  Priority:   {}", run.priority.as_str());
    println!("  By:         {}", run.submitted_by);
    println!("  Created:    {}", run.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:    {}", run.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Progress:   {} completed, {} failed, {} pending",
        run.completed_tasks, run.failed_tasks, run.pending_tasks
    );
    println!();
    println!("{:<40}  {:<16}  {:<16}  {}", "TASK", "TYPE", "AGENT", "STATE");
    println!("{}", "-".repeat(90));
    for task in &run.tasks {
        println!(
            "{:<40}  {:<16}  {:<16}  {}",
            task.task_id.to_string(),
            task.spec.task_type.as_str(),
            task.spec.agent,
            task_state(&task.dispatch, task.result_status)
        );
    }
}

fn task_state(dispatch: &DispatchState, result: Option<ResultStatus>) -> String {
    match (dispatch, result) {
        (_, Some(status)) => status.as_str().to_uppercase(),
        (DispatchState::Pending, None) => "PENDING".to_string(),
        (DispatchState::Published { .. }, None) => "DISPATCHED".to_string(),
        (DispatchState::PublishFailed { error }, None) => format!("PUBLISH FAILED ({error})"),
    }
}

fn print_usage(usage: &UsageSnapshot) {
    println!("{:<8}  {:<12}  {:>8}  {:>8}  {:>9}", "QUOTA", "PERIOD", "USED", "LIMIT", "REMAINING");
    println!("{}", "-".repeat(52));
    for (name, quota) in [("monthly", &usage.monthly), ("daily", &usage.daily)] {
        println!(
            "{:<8}  {:<12}  {:>8}  {:>8}  {:>9}",
            name,
            quota.period,
            quota.used,
            quota.limit,
            quota.remaining()
        );
    }
}
