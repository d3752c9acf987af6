//! Reimburse Core - employee reimbursement reconciliation engine
//!
//! Form responses are matched against the HR roster and expanded into a
//! payment-upload ledger with review highlighting. The crate follows a
//! hexagonal layout:
//!
//! - **domain**: records, ledger rows, styled workbooks, errors
//! - **ports**: traits for the form API, blob store, workbook I/O and run observer
//! - **services**: the engine stages, the run pipeline, scheduling, logging
//! - **adapters**: HTTP clients, local store, xlsx and CSV

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::{DriveStore, FormsApiClient, LocalStore, XlsxCodec};
use config::{Config, StorageBackend};
use ports::{BlobStore, FormResponseSource, RunObserver};
use services::{EntryPoint, LoggingService, ReconcileService, SingleFlight};

pub use domain::result::{Error, Outcome};
pub use domain::{
    Category, CategoryRecord, LedgerRow, MatchStatus, ReconciledRecord, RosterRecord, Value,
};
pub use services::{RunMode, RunOptions, RunReport};

/// Everything a front end needs for one process
///
/// Holds the loaded configuration, the run log and the single-flight
/// locks. Remote adapters are built on demand so commands that never talk
/// to the network work without credentials.
pub struct ReconcileContext {
    pub config: Arc<Config>,
    pub data_dir: PathBuf,
    pub logger: Arc<LoggingService>,
    pub single_flight: SingleFlight,
}

impl ReconcileContext {
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let config = Config::load(data_dir)?;
        let logger = LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION"))
            .context("Failed to open run log")?;
        let single_flight = SingleFlight::new(data_dir)?;

        Ok(Self {
            config: Arc::new(config),
            data_dir: data_dir.to_path_buf(),
            logger: Arc::new(logger),
            single_flight,
        })
    }

    /// Blob store for the configured backend
    pub fn blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        let storage = &self.config.storage;
        Ok(match storage.backend {
            StorageBackend::Drive => {
                let token = storage.drive_access_token.as_deref().unwrap_or_default();
                Arc::new(DriveStore::new(token)?)
            }
            StorageBackend::Local => {
                Arc::new(LocalStore::new(self.config.local_store_root(&self.data_dir))?)
            }
        })
    }

    pub fn form_source(&self) -> Result<Arc<dyn FormResponseSource>> {
        Ok(Arc::new(FormsApiClient::new(&self.config.form_api)?))
    }

    pub fn observer(&self) -> Arc<dyn RunObserver> {
        self.logger.clone()
    }

    /// Pipeline wired to the configured adapters
    pub fn reconcile_service(&self) -> Result<ReconcileService> {
        Ok(ReconcileService::new(
            self.config.clone(),
            self.form_source()?,
            self.blob_store()?,
            Arc::new(XlsxCodec),
            Arc::new(XlsxCodec),
            self.observer(),
        ))
    }
}
