//! CLI command implementations

pub mod check_account;
pub mod logs;
pub mod run;
pub mod schedule;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use reimburse_core::services::EntryPoint;
use reimburse_core::ReconcileContext;

/// Data directory from `REIMBURSE_DIR`, else `~/.reimburse`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("REIMBURSE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".reimburse"))
        .context("Could not find home directory (set REIMBURSE_DIR)")
}

pub fn get_context(entry_point: EntryPoint) -> Result<ReconcileContext> {
    let data_dir = get_data_dir()?;
    ReconcileContext::new(&data_dir, entry_point).context("Failed to initialize reimburse context")
}
