//! Run observer port
//!
//! Every recovered anomaly and lifecycle event in a run goes through an
//! injected observer instead of being printed. The DuckDB logging service
//! is the production implementation.

use std::sync::Mutex;

use crate::domain::{LogEvent, Outcome};

pub trait RunObserver: Send + Sync {
    fn record(&self, event: LogEvent);

    /// Record a recovered anomaly
    fn anomaly(&self, stage: &str, message: &str) {
        self.record(LogEvent::anomaly(stage, message));
    }
}

impl<T> Outcome<T> {
    /// Report the anomaly (if any) and keep the value
    pub fn observe(self, observer: &dyn RunObserver, stage: &str) -> T {
        let (value, reason) = self.into_parts();
        if let Some(reason) = reason {
            observer.anomaly(stage, &reason);
        }
        value
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn record(&self, _event: LogEvent) {}
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<LogEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages of recorded anomalies, in order
    pub fn anomalies(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.event == "anomaly")
            .filter_map(|e| e.error_message)
            .collect()
    }
}

impl RunObserver for MemoryObserver {
    fn record(&self, event: LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
