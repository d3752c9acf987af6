//! Service layer - the reconciliation engine
//!
//! Stages are plain functions over domain types and run in order:
//! field mapping, normalization, matching, expansion, presentation.
//! `pipeline` sequences them against the ports; `scheduler` runs the
//! pipeline periodically.

pub mod dates;
pub mod expander;
pub mod field_mapper;
pub mod logging;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod presentation;
pub mod scheduler;

pub use logging::{EntryPoint, EventCount, LogEntry, LoggingService};
pub use pipeline::{
    CategoryCounts, ReconcileService, RenderedFile, RunMode, RunOptions, RunReport,
};
pub use scheduler::{FlightGuard, ScheduledJob, Scheduler, SingleFlight, TickOutcome};
