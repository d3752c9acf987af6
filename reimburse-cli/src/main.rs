//! Reimburse CLI - reimbursement reconciliation from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reimburse_core::RunMode;

mod commands;
mod output;

use commands::{check_account, logs, run, schedule, status};

/// Reconcile reimbursement form responses against the HR roster
#[derive(Parser)]
#[command(name = "reimburse", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation and publish the workbooks
    Run {
        /// Which responses to pull (completed, archived)
        #[arg(long, default_value = "completed")]
        mode: RunMode,
        /// Render everything but upload nothing
        #[arg(long)]
        dry_run: bool,
        /// Write the rendered workbooks to this directory (dry run only)
        #[arg(long, requires = "dry_run")]
        out: Option<PathBuf>,
        /// Also export the payment ledger as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run both jobs on their configured intervals until interrupted
    Schedule {
        /// Tick every job once and exit
        #[arg(long)]
        once: bool,
    },

    /// Show configuration and the last run of each job
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check account codes the way the ledger does
    CheckAccount {
        /// Codes to check
        #[arg(required = true)]
        codes: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the run log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            mode,
            dry_run,
            out,
            csv,
            json,
        } => run::run(mode, dry_run, out, csv, json),
        Commands::Schedule { once } => schedule::run(once),
        Commands::Status { json } => status::run(json),
        Commands::CheckAccount { codes, json } => check_account::run(&codes, json),
        Commands::Logs { command } => logs::run(command),
    }
}
