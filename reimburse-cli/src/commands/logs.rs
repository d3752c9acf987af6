//! Logs command - view and manage the run log

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use reimburse_core::services::{EntryPoint, LogEntry, LoggingService};

use super::get_data_dir;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors and anomalies
        #[arg(long)]
        errors: bool,
        /// Show every entry of one run
        #[arg(long)]
        run: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Event counts and log database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn print_entries(entries: Vec<LogEntry>) {
    let mut table = output::create_table();
    table.set_header(vec!["Time", "Entry", "Event", "Job", "Stage", "Error"]);

    for entry in entries {
        let stage = [entry.stage.as_deref(), entry.category.as_deref()]
            .iter()
            .filter_map(|&s| s)
            .collect::<Vec<_>>()
            .join(" / ");
        let error = entry
            .error_message
            .as_deref()
            .map(|m| m.red().to_string())
            .unwrap_or_default();

        table.add_row(vec![
            output::format_timestamp(entry.timestamp),
            entry.entry_point,
            entry.event,
            entry.job.unwrap_or_default(),
            stage,
            error,
        ]);
    }

    println!("{}", table);
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List {
            limit,
            errors,
            run,
            json,
        } => {
            let service = get_logging_service()?;
            let entries = match (&run, errors) {
                (Some(run_id), _) => service.get_run(run_id)?,
                (None, true) => service.get_errors(limit)?,
                (None, false) => service.get_recent(limit)?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }
            print_entries(entries);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let service = get_logging_service()?;
            let cutoff_ms = chrono::Utc::now().timestamp_millis()
                - (older_than_days as i64 * 24 * 60 * 60 * 1000);

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff_ms)?;

            if json {
                println!("{}", serde_json::json!({"deleted": deleted}));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let service = get_logging_service()?;
            let total = service.count()?;
            let events = service.stats()?;
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "totalEntries": total,
                        "events": events,
                        "databasePath": db_path.to_string_lossy(),
                        "databaseSizeBytes": size_bytes
                    })
                );
                return Ok(());
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Database: {}", db_path.display());
            println!("  Size: {}", output::format_size(size_bytes));

            if !events.is_empty() {
                println!();
                let mut table = output::create_table();
                table.set_header(vec!["Event", "Count", "Last seen"]);
                for event in events {
                    table.add_row(vec![
                        event.event,
                        event.count.to_string(),
                        output::format_timestamp(event.last_timestamp),
                    ]);
                }
                println!("{}", table);
            }
        }
    }

    Ok(())
}
