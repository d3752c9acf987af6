//! Run command - one reconciliation, uploaded or rendered locally

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reimburse_core::adapters::csv_export;
use reimburse_core::domain::LogEvent;
use reimburse_core::ports::RunObserver;
use reimburse_core::services::{EntryPoint, RenderedFile};
use reimburse_core::{RunMode, RunOptions, RunReport};

use super::get_context;
use crate::output;

fn spinner(mode: RunMode) -> Option<ProgressBar> {
    if atty::isnt(atty::Stream::Stderr) {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(format!("Reconciling {} responses...", mode));
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}

fn write_rendered(dir: &Path, files: &[RenderedFile]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    files
        .iter()
        .map(|file| {
            let path = dir.join(&file.name);
            std::fs::write(&path, &file.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

pub fn run(
    mode: RunMode,
    dry_run: bool,
    out: Option<PathBuf>,
    csv: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ctx = get_context(EntryPoint::Cli)?;

    let Some(_guard) = ctx.single_flight.try_acquire(mode.as_str())? else {
        ctx.logger
            .record(LogEvent::new("run_skipped").with_job(mode.as_str()));
        bail!("A {} run is already in progress", mode);
    };

    let service = ctx.reconcile_service()?;
    let bar = if json { None } else { spinner(mode) };
    let result = service.run(mode, Local::now(), RunOptions { dry_run });
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let report = result.with_context(|| format!("{} run failed", mode))?;

    let mut written = Vec::new();
    if let Some(dir) = &out {
        written = write_rendered(dir, &report.rendered)?;
    }
    if let Some(path) = &csv {
        csv_export::export_ledger(&report.ledger, path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    for path in &written {
        println!("  Wrote {}", path.display());
    }
    if let Some(path) = &csv {
        println!("  Ledger CSV: {}", path.display());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.dry_run {
        output::warning("DRY RUN - nothing uploaded");
        println!();
    }
    println!("{} {} ({})", "Run".bold(), report.mode, report.run_id.dimmed());
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["", "Rows"]);
    let counts = [
        ("Expense submissions", report.submissions.expense),
        ("Mileage submissions", report.submissions.mileage),
        ("Conference submissions", report.submissions.conference),
        ("Roster rows", report.roster_rows),
        ("Reconciled", report.reconciled),
        ("Matched", report.matched),
        ("Not found", report.not_found),
        ("Ledger rows", report.ledger_rows),
        ("Flagged for review", report.flagged_rows),
    ];
    for (label, count) in counts {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    println!("{}", table);

    if !report.uploaded.is_empty() {
        println!();
        output::success("Uploaded:");
        for file in &report.uploaded {
            if file.link.is_empty() {
                println!("  {}", file.name);
            } else {
                println!("  {} {}", file.name, file.link.dimmed());
            }
        }
    }

    if !report.warnings.is_empty() {
        println!();
        output::warning("Warnings:");
        for warning in &report.warnings {
            println!("  {}", warning);
        }
    }
}
