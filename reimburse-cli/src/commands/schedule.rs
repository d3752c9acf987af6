//! Schedule command - both jobs on their intervals, single-flight per job

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use reimburse_core::services::{
    EntryPoint, ReconcileService, ScheduledJob, Scheduler, TickOutcome,
};
use reimburse_core::{RunMode, RunOptions};

use super::get_context;
use crate::output;

const MAX_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

/// Interval for a job, between one minute and a year
fn job_period(minutes: u64) -> Duration {
    Duration::from_secs(minutes.clamp(1, MAX_INTERVAL_MINUTES).saturating_mul(60))
}

fn job(service: &Arc<ReconcileService>, mode: RunMode, minutes: u64) -> ScheduledJob {
    let service = service.clone();
    ScheduledJob::new(
        mode.as_str(),
        job_period(minutes),
        move || {
            service.run(mode, Local::now(), RunOptions::default())?;
            Ok(())
        },
    )
}

pub fn run(once: bool) -> Result<()> {
    let ctx = get_context(EntryPoint::Scheduler)?;
    let service = Arc::new(ctx.reconcile_service()?);
    let schedule = &ctx.config.schedule;

    let scheduler = Scheduler::new(ctx.single_flight.clone(), ctx.observer())
        .add(job(&service, RunMode::Completed, schedule.completed_interval_minutes))
        .add(job(&service, RunMode::Archived, schedule.archived_interval_minutes));

    if once {
        for job in scheduler.jobs() {
            match Scheduler::tick(&ctx.single_flight, ctx.logger.as_ref(), job) {
                TickOutcome::Ran => output::success(&format!("{}: done", job.name)),
                TickOutcome::Skipped => output::warning(&format!("{}: already running, skipped", job.name)),
                TickOutcome::Failed(e) => output::error(&format!("{}: {}", job.name, e)),
            }
        }
        return Ok(());
    }

    for job in scheduler.jobs() {
        output::info(&format!("{} every {} min", job.name, job.every.as_secs() / 60));
    }
    println!("Press Ctrl-C to stop.");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(scheduler.run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    }));
    output::info("Scheduler stopped");
    Ok(())
}
