//! Status command - configuration summary and last run per job

use anyhow::Result;
use colored::Colorize;
use reimburse_core::config::StorageBackend;
use reimburse_core::services::{EntryPoint, LogEntry};
use reimburse_core::RunMode;
use serde_json::json;

use super::get_context;
use crate::output;

fn last_run_label(entry: &Option<LogEntry>) -> String {
    entry
        .as_ref()
        .map(|e| output::format_timestamp(e.timestamp))
        .unwrap_or_else(|| "never".to_string())
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context(EntryPoint::Cli)?;
    let config = &ctx.config;

    let mut jobs = Vec::new();
    for mode in RunMode::ALL {
        let completed = ctx.logger.last_event("run_completed", Some(mode.as_str()))?;
        let failed = ctx.logger.last_event("run_failed", Some(mode.as_str()))?;
        let running = ctx.single_flight.try_acquire(mode.as_str())?.is_none();
        jobs.push((mode, completed, failed, running));
    }

    if json {
        let jobs: Vec<_> = jobs
            .iter()
            .map(|(mode, completed, failed, running)| {
                json!({
                    "job": mode.as_str(),
                    "running": running,
                    "lastCompleted": completed.as_ref().map(|e| e.timestamp),
                    "lastFailed": failed.as_ref().map(|e| e.timestamp),
                    "lastError": failed.as_ref().and_then(|e| e.error_message.clone()),
                })
            })
            .collect();
        let status = json!({
            "dataDir": ctx.data_dir,
            "formApiUrl": config.form_api.base_url,
            "formApiKeySet": config.form_api.api_key.is_some(),
            "storage": config.storage.backend,
            "roster": format!("{}/{}", config.storage.roster_folder, config.storage.roster_file_name),
            "jobs": jobs,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Reimbursement Reconciliation".bold());
    println!();

    let storage = match config.storage.backend {
        StorageBackend::Drive => "Google Drive".to_string(),
        StorageBackend::Local => format!(
            "local ({})",
            config.local_store_root(&ctx.data_dir).display()
        ),
    };
    let key = if config.form_api.api_key.is_some() {
        "set".green().to_string()
    } else {
        "missing".red().to_string()
    };

    let mut table = output::create_table();
    table.add_row(vec!["Data directory".to_string(), ctx.data_dir.display().to_string()]);
    table.add_row(vec!["Form API".to_string(), config.form_api.base_url.clone()]);
    table.add_row(vec!["Form API key".to_string(), key]);
    table.add_row(vec!["Storage".to_string(), storage]);
    table.add_row(vec![
        "Roster".to_string(),
        format!("{}/{}", config.storage.roster_folder, config.storage.roster_file_name),
    ]);
    table.add_row(vec![
        "Archive window".to_string(),
        format!("{} weeks", config.run.archived_window_weeks),
    ]);
    println!("{}", table);
    println!();

    let mut runs = output::create_table();
    runs.set_header(vec!["Job", "Every", "Last completed", "Last failed", ""]);
    for (mode, completed, failed, running) in &jobs {
        let every = match mode {
            RunMode::Completed => config.schedule.completed_interval_minutes,
            RunMode::Archived => config.schedule.archived_interval_minutes,
        };
        runs.add_row(vec![
            mode.to_string(),
            format!("{} min", every),
            last_run_label(completed),
            last_run_label(failed),
            if *running {
                "running".yellow().to_string()
            } else {
                String::new()
            },
        ]);
    }
    println!("{}", runs);

    if let Some(error) = jobs
        .iter()
        .filter_map(|(_, _, failed, _)| failed.as_ref())
        .max_by_key(|e| e.timestamp)
        .and_then(|e| e.error_message.as_deref())
    {
        println!();
        output::warning(&format!("Last failure: {}", error));
    }

    Ok(())
}
