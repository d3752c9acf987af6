//! Concurrent run tests
//!
//! Two schedulers (or a scheduler and a manual CLI run) may fire the same
//! job at once. The single-flight lock must let exactly one of them through.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

use reimburse_core::ports::MemoryObserver;
use reimburse_core::services::{ScheduledJob, Scheduler, SingleFlight, TickOutcome};

/// Contenders per job; a handful of processes is realistic
const THREAD_COUNT: usize = 6;

/// Every thread opens its own lock handle on the same data directory and
/// tries the same job at the same moment.
#[test]
fn test_only_one_contender_acquires() {
    let dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let acquired = Arc::new(AtomicUsize::new(0));
    let refused = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let data_dir = dir.path().to_path_buf();
            let barrier = barrier.clone();
            let acquired = acquired.clone();
            let refused = refused.clone();
            thread::spawn(move || {
                let flight = SingleFlight::new(&data_dir).unwrap();
                barrier.wait();
                match flight.try_acquire("completed").unwrap() {
                    Some(guard) => {
                        acquired.fetch_add(1, Ordering::SeqCst);
                        // hold until everyone else has tried
                        barrier.wait();
                        drop(guard);
                    }
                    None => {
                        refused.fetch_add(1, Ordering::SeqCst);
                        barrier.wait();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(refused.load(Ordering::SeqCst), THREAD_COUNT - 1);
}

#[test]
fn test_jobs_lock_independently() {
    let dir = TempDir::new().unwrap();
    let flight = SingleFlight::new(dir.path()).unwrap();

    let completed = flight.try_acquire("completed").unwrap();
    let archived = flight.try_acquire("archived").unwrap();

    assert!(completed.is_some());
    assert!(archived.is_some());
}

#[test]
fn test_lock_released_after_guard_drops() {
    let dir = TempDir::new().unwrap();
    let flight = SingleFlight::new(dir.path()).unwrap();

    let guard = flight.try_acquire("completed").unwrap();
    assert!(guard.is_some());
    assert!(flight.try_acquire("completed").unwrap().is_none());

    drop(guard);
    assert!(flight.try_acquire("completed").unwrap().is_some());
}

/// A tick that lands while the previous run is still going is skipped,
/// not queued.
#[test]
fn test_overlapping_ticks_skip() {
    let dir = TempDir::new().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));

    let job = {
        let runs = runs.clone();
        let started = started.clone();
        let release = release.clone();
        ScheduledJob::new(
            "completed",
            Duration::from_secs(60),
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                started.wait();
                release.wait();
                Ok(())
            },
        )
    };
    let job = Arc::new(job);

    let first = {
        let data_dir = dir.path().to_path_buf();
        let job = job.clone();
        thread::spawn(move || {
            let flight = SingleFlight::new(&data_dir).unwrap();
            Scheduler::tick(&flight, &MemoryObserver::new(), &job)
        })
    };

    started.wait();
    let observer = MemoryObserver::new();
    let flight = SingleFlight::new(dir.path()).unwrap();
    let second = Scheduler::tick(&flight, &observer, &job);
    release.wait();

    assert_eq!(first.join().unwrap(), TickOutcome::Ran);
    assert_eq!(second, TickOutcome::Skipped);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(observer.events().iter().any(|e| e.event == "run_skipped"));
}
