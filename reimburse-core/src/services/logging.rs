//! Logging service - structured run events in DuckDB
//!
//! Events land in `logs.duckdb` inside the data directory. Only run
//! bookkeeping is stored (stage names, counts, error text); employee names,
//! ids and amounts never reach the log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::domain::LogEvent;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::ports::RunObserver;

const LOG_DB_FILE: &str = "logs.duckdb";

const ENTRY_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, \
     event, job, run_id, stage, category, error_message, error_details";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Millisecond timestamp in the high bits, per-process sequence in the low 16
fn next_id() -> u64 {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | seq
}

/// Which front door started the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Scheduler,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Scheduler => "scheduler",
        }
    }
}

/// One stored run event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub job: Option<String>,
    pub run_id: Option<String>,
    pub stage: Option<String>,
    pub category: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    /// Row in `ENTRY_COLUMNS` order
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            timestamp: row.get("timestamp")?,
            entry_point: row.get("entry_point")?,
            app_version: row.get("app_version")?,
            platform: row.get("platform")?,
            event: row.get("event")?,
            job: row.get("job")?,
            run_id: row.get("run_id")?,
            stage: row.get("stage")?,
            category: row.get("category")?,
            error_message: row.get("error_message")?,
            error_details: row.get("error_details")?,
        })
    }
}

/// Per-event totals for `logs stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCount {
    pub event: String,
    pub count: u64,
    pub last_timestamp: i64,
}

/// Run log backed by a DuckDB file in the data directory
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open or create the log database and bring its schema up to date
    pub fn new(
        data_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = data_dir.join(LOG_DB_FILE);
        let service = Self {
            conn: Mutex::new(Connection::open(&db_path)?),
            db_path,
            entry_point,
            app_version: app_version.into(),
        };
        service.migrate()?;
        Ok(service)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("Log connection lock poisoned: {}", e))
    }

    /// The first migration creates the bookkeeping table and is idempotent,
    /// so it runs unconditionally before the applied set is read.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        if let Some((_, bootstrap)) = LOG_MIGRATIONS.first() {
            conn.execute_batch(bootstrap)?;
        }

        let applied: Vec<String> = conn
            .prepare("SELECT migration_name FROM sys_log_migrations")?
            .query_map([], |row| row.get(0))?
            .collect::<duckdb::Result<_>>()?;

        for (name, sql) in LOG_MIGRATIONS {
            if applied.iter().any(|done| done == name) {
                continue;
            }
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO sys_log_migrations (migration_name) VALUES (?)",
                [name],
            )?;
        }
        Ok(())
    }

    fn select(&self, tail: &str, params: &[&dyn ToSql]) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM sys_logs {}", ENTRY_COLUMNS, tail);
        let entries = conn
            .prepare(&sql)?
            .query_map(params, LogEntry::from_row)?
            .collect::<duckdb::Result<_>>()?;
        Ok(entries)
    }

    /// Record an event stamped with this process's entry point, version and OS
    pub fn log(&self, event: LogEvent) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sys_logs (id, timestamp, entry_point, app_version, platform, event, \
             job, run_id, stage, category, error_message, error_details) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                next_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                std::env::consts::OS,
                &event.event,
                &event.job,
                &event.run_id,
                &event.stage,
                &event.category,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    pub fn log_error(&self, event: &str, message: &str, details: Option<&str>) -> Result<()> {
        let event = LogEvent::new(event).with_error(message);
        self.log(match details {
            Some(details) => event.with_error_details(details),
            None => event,
        })
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.select("ORDER BY timestamp DESC, id DESC LIMIT ?", &[&(limit as i64)])
    }

    /// Entries carrying an error message (failures and anomalies)
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.select(
            "WHERE error_message IS NOT NULL ORDER BY timestamp DESC, id DESC LIMIT ?",
            &[&(limit as i64)],
        )
    }

    /// Every entry of one run, oldest first
    pub fn get_run(&self, run_id: &str) -> Result<Vec<LogEntry>> {
        self.select("WHERE run_id = ? ORDER BY timestamp, id", &[&run_id])
    }

    /// Latest entry with the given event name, optionally for one job
    pub fn last_event(&self, event: &str, job: Option<&str>) -> Result<Option<LogEntry>> {
        let latest = "ORDER BY timestamp DESC, id DESC LIMIT 1";
        let entries = match job {
            Some(job) => self.select(
                &format!("WHERE event = ? AND job = ? {}", latest),
                &[&event, &job],
            )?,
            None => self.select(&format!("WHERE event = ? {}", latest), &[&event])?,
        };
        Ok(entries.into_iter().next())
    }

    pub fn stats(&self) -> Result<Vec<EventCount>> {
        let conn = self.conn()?;
        let counts = conn
            .prepare(
                "SELECT event, COUNT(*), MAX(timestamp) FROM sys_logs \
                 GROUP BY event ORDER BY COUNT(*) DESC, event",
            )?
            .query_map([], |row| {
                Ok(EventCount {
                    event: row.get(0)?,
                    count: row.get(1)?,
                    last_timestamp: row.get(2)?,
                })
            })?
            .collect::<duckdb::Result<_>>()?;
        Ok(counts)
    }

    pub fn count(&self) -> Result<u64> {
        Ok(self
            .conn()?
            .query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?)
    }

    /// Delete entries older than a unix-ms timestamp
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl RunObserver for LoggingService {
    fn record(&self, event: LogEvent) {
        // A broken log must never fail a run
        let _ = self.log(event);
    }
}
