//! Periodic jobs with single-flight guards
//!
//! A job that is still running when its next tick fires is skipped, never
//! queued. The guard is an exclusive file lock so a manual `run` from
//! another process is skipped the same way.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fs2::FileExt;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::LogEvent;
use crate::ports::RunObserver;

/// Lock files under `<data dir>/locks`, one per job name
#[derive(Debug, Clone)]
pub struct SingleFlight {
    dir: PathBuf,
}

/// Held for the duration of one run; released on drop
#[derive(Debug)]
pub struct FlightGuard {
    file: File,
    job: String,
}

impl FlightGuard {
    pub fn job(&self) -> &str {
        &self.job
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl SingleFlight {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("locks");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn lock_path(&self, job: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", job))
    }

    /// `None` when another run of `job` holds the lock
    pub fn try_acquire(&self, job: &str) -> Result<Option<FlightGuard>> {
        let path = self.lock_path(job);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FlightGuard {
                file,
                job: job.to_string(),
            })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to lock {}", path.display())),
        }
    }
}

/// What happened on one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ran,
    Skipped,
    Failed(String),
}

pub type JobFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub every: Duration,
    pub task: JobFn,
}

impl ScheduledJob {
    pub fn new(
        name: impl Into<String>,
        every: Duration,
        task: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            every,
            task: Arc::new(task),
        }
    }
}

pub struct Scheduler {
    flight: SingleFlight,
    observer: Arc<dyn RunObserver>,
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new(flight: SingleFlight, observer: Arc<dyn RunObserver>) -> Self {
        Self {
            flight,
            observer,
            jobs: Vec::new(),
        }
    }

    pub fn add(mut self, job: ScheduledJob) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Run `job` now unless it is already running somewhere
    pub fn tick(flight: &SingleFlight, observer: &dyn RunObserver, job: &ScheduledJob) -> TickOutcome {
        let guard = match flight.try_acquire(&job.name) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                observer.record(LogEvent::new("run_skipped").with_job(job.name.clone()));
                return TickOutcome::Skipped;
            }
            Err(e) => {
                observer.record(
                    LogEvent::new("run_skipped")
                        .with_job(job.name.clone())
                        .with_error(format!("{:#}", e)),
                );
                return TickOutcome::Failed(e.to_string());
            }
        };

        let outcome = match (job.task)() {
            Ok(()) => TickOutcome::Ran,
            Err(e) => TickOutcome::Failed(format!("{:#}", e)),
        };
        drop(guard);
        outcome
    }

    /// Drive every job on its own interval until `shutdown` resolves.
    ///
    /// The first tick fires immediately. Ticks missed while a run is in
    /// progress are dropped.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        let mut handles = Vec::new();
        for job in self.jobs {
            let flight = self.flight.clone();
            let observer = self.observer.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = interval(job.every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let (flight, tick_observer, tick_job) =
                        (flight.clone(), observer.clone(), job.clone());
                    let joined = tokio::task::spawn_blocking(move || {
                        Scheduler::tick(&flight, tick_observer.as_ref(), &tick_job)
                    })
                    .await;
                    if let Err(e) = joined {
                        observer.record(
                            LogEvent::new("run_failed")
                                .with_job(job.name.clone())
                                .with_error(format!("run aborted: {}", e)),
                        );
                    }
                }
            }));
        }

        shutdown.await;
        for handle in handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MemoryObserver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_skipped_until_release() {
        let dir = TempDir::new().unwrap();
        let flight = SingleFlight::new(dir.path()).unwrap();

        let guard = flight.try_acquire("completed").unwrap();
        assert!(guard.is_some());
        assert!(flight.try_acquire("completed").unwrap().is_none());
        // Other jobs are independent
        assert!(flight.try_acquire("archived").unwrap().is_some());

        drop(guard);
        assert!(flight.try_acquire("completed").unwrap().is_some());
        assert!(flight.lock_path("completed").exists());
    }

    #[test]
    fn test_tick_logs_skip_when_held() {
        let dir = TempDir::new().unwrap();
        let flight = SingleFlight::new(dir.path()).unwrap();
        let observer = MemoryObserver::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let job = ScheduledJob::new("completed", Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let _held = flight.try_acquire("completed").unwrap();
        assert_eq!(Scheduler::tick(&flight, &observer, &job), TickOutcome::Skipped);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(observer.events()[0].event, "run_skipped");
        assert_eq!(observer.events()[0].job.as_deref(), Some("completed"));
    }

    #[test]
    fn test_tick_reports_job_failure() {
        let dir = TempDir::new().unwrap();
        let flight = SingleFlight::new(dir.path()).unwrap();
        let job = ScheduledJob::new("archived", Duration::from_secs(60), || {
            anyhow::bail!("storage unavailable")
        });

        let outcome = Scheduler::tick(&flight, &MemoryObserver::new(), &job);
        assert_eq!(outcome, TickOutcome::Failed("storage unavailable".into()));
        // Lock is released after a failed run
        assert!(flight.try_acquire("archived").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scheduler_ticks_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let flight = SingleFlight::new(dir.path()).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let scheduler = Scheduler::new(flight, Arc::new(MemoryObserver::new())).add(
            ScheduledJob::new("completed", Duration::from_millis(20), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(150)))
            .await;

        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_panicking_run_is_logged_as_failed() {
        let dir = TempDir::new().unwrap();
        let flight = SingleFlight::new(dir.path()).unwrap();
        let observer = Arc::new(MemoryObserver::new());

        let scheduler = Scheduler::new(flight.clone(), observer.clone()).add(ScheduledJob::new(
            "archived",
            Duration::from_secs(60),
            || panic!("boom"),
        ));
        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        let failed: Vec<_> = observer
            .events()
            .into_iter()
            .filter(|e| e.event == "run_failed")
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].job.as_deref(), Some("archived"));
        // The lock is released even though the run panicked
        assert!(flight.try_acquire("archived").unwrap().is_some());
    }
}
