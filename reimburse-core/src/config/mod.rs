//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "formApi": { "baseUrl": "...", "apiKey": "..." },
//!   "storage": { "backend": "drive", "rosterFolder": "...", ... },
//!   "campaigns": { "expense": { "old": 153257, "new": 173260 }, ... },
//!   "payment": { "orgId": "33", "bank": "COUNTY", ... },
//!   "schedule": { "completedIntervalMinutes": 60, ... },
//!   "run": { "archivedWindowWeeks": 7, "uploadAuditWorkbook": true }
//! }
//! ```
//! Every field has a default, so a missing or partial file still loads.
//! The form schema tables are static and live in [`schema`].

pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{Category, SchemaVersion};
pub use schema::{CategorySchema, FormSchemas, InvoiceSource};

pub const DEFAULT_FORM_API_URL: &str = "https://app.informedk12.com/api/v1/campaigns";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    form_api: FormApiSettings,
    #[serde(default)]
    storage: StorageSettings,
    #[serde(default)]
    campaigns: Campaigns,
    #[serde(default)]
    payment: PaymentSettings,
    #[serde(default)]
    schedule: ScheduleSettings,
    #[serde(default)]
    run: RunSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormApiSettings {
    #[serde(default = "default_form_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for FormApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_form_api_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Drive,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend (defaults to `<data dir>/store`)
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    #[serde(default = "default_roster_folder")]
    pub roster_folder: String,
    #[serde(default = "default_roster_file_name")]
    pub roster_file_name: String,
    #[serde(default = "default_completed_folder")]
    pub completed_folder: String,
    #[serde(default = "default_archived_folder")]
    pub archived_folder: String,
    #[serde(default)]
    pub drive_access_token: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: None,
            roster_folder: default_roster_folder(),
            roster_file_name: default_roster_file_name(),
            completed_folder: default_completed_folder(),
            archived_folder: default_archived_folder(),
            drive_access_token: None,
        }
    }
}

/// Old and new campaign ids for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignPair {
    pub old: u64,
    pub new: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaigns {
    pub expense: CampaignPair,
    pub mileage: CampaignPair,
    pub conference: CampaignPair,
}

impl Default for Campaigns {
    fn default() -> Self {
        Self {
            expense: CampaignPair { old: 153257, new: 173260 },
            mileage: CampaignPair { old: 159935, new: 173261 },
            conference: CampaignPair { old: 150715, new: 173262 },
        }
    }
}

impl Campaigns {
    pub fn campaign_id(&self, category: Category, version: SchemaVersion) -> u64 {
        let pair = match category {
            Category::Expense => self.expense,
            Category::Mileage => self.mileage,
            Category::Conference => self.conference,
        };
        match version {
            SchemaVersion::Old => pair.old,
            SchemaVersion::New => pair.new,
        }
    }
}

/// Fixed metadata stamped on every ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSettings {
    #[serde(default = "default_org_id")]
    pub org_id: String,
    #[serde(default = "default_bank")]
    pub bank: String,
    #[serde(default = "default_payment_type")]
    pub payment_type: String,
    #[serde(default = "default_comment")]
    pub comment: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            org_id: default_org_id(),
            bank: default_bank(),
            payment_type: default_payment_type(),
            comment: default_comment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettings {
    #[serde(default = "default_completed_interval")]
    pub completed_interval_minutes: u64,
    #[serde(default = "default_archived_interval")]
    pub archived_interval_minutes: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            completed_interval_minutes: default_completed_interval(),
            archived_interval_minutes: default_archived_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    /// How far back an archived run looks for completed responses
    #[serde(default = "default_archived_window_weeks")]
    pub archived_window_weeks: u32,
    /// Publish the per-category audit workbook next to the ledger
    #[serde(default = "default_true")]
    pub upload_audit_workbook: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            archived_window_weeks: default_archived_window_weeks(),
            upload_audit_workbook: true,
        }
    }
}

fn default_form_api_url() -> String {
    DEFAULT_FORM_API_URL.to_string()
}
fn default_roster_folder() -> String {
    "roster".to_string()
}
fn default_roster_file_name() -> String {
    "PUSD Employee Escape Data.xlsx".to_string()
}
fn default_completed_folder() -> String {
    "completed".to_string()
}
fn default_archived_folder() -> String {
    "archived".to_string()
}
fn default_org_id() -> String {
    "33".to_string()
}
fn default_bank() -> String {
    "COUNTY".to_string()
}
fn default_payment_type() -> String {
    "E".to_string()
}
fn default_comment() -> String {
    "REIMB EXPENSE".to_string()
}
fn default_completed_interval() -> u64 {
    60
}
fn default_archived_interval() -> u64 {
    7 * 24 * 60
}
fn default_archived_window_weeks() -> u32 {
    7
}
fn default_true() -> bool {
    true
}

/// Resolved configuration, built once and passed explicitly
#[derive(Debug, Clone)]
pub struct Config {
    pub form_api: FormApiSettings,
    pub storage: StorageSettings,
    pub campaigns: Campaigns,
    pub payment: PaymentSettings,
    pub schedule: ScheduleSettings,
    pub run: RunSettings,
    pub schemas: FormSchemas,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(SettingsFile::default())
    }
}

impl Config {
    fn from_settings(raw: SettingsFile) -> Self {
        Self {
            form_api: raw.form_api.clone(),
            storage: raw.storage.clone(),
            campaigns: raw.campaigns.clone(),
            payment: raw.payment.clone(),
            schedule: raw.schedule.clone(),
            run: raw.run.clone(),
            schemas: FormSchemas::default(),
            _raw_settings: raw,
        }
    }

    /// Load config from the data directory
    ///
    /// Secrets and the API base can be supplied through the environment:
    /// `REIMBURSE_FORM_API_KEY`, `REIMBURSE_DRIVE_TOKEN` and
    /// `REIMBURSE_FORM_API_URL` (useful for pointing at a mock server).
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("REIMBURSE_FORM_API_KEY") {
            self.form_api.api_key = Some(key);
        }
        if let Some(token) = non_empty("REIMBURSE_DRIVE_TOKEN") {
            self.storage.drive_access_token = Some(token);
        }
        if let Some(url) = non_empty("REIMBURSE_FORM_API_URL") {
            self.form_api.base_url = url;
        }
    }

    /// Save config to the data directory.
    /// Secrets picked up from the environment are not written back.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = self._raw_settings.clone();
        settings.campaigns = self.campaigns.clone();
        settings.payment = self.payment.clone();
        settings.schedule = self.schedule.clone();
        settings.run = self.run.clone();
        settings.storage = StorageSettings {
            drive_access_token: settings.storage.drive_access_token.clone(),
            ..self.storage.clone()
        };
        settings.form_api = FormApiSettings {
            api_key: settings.form_api.api_key.clone(),
            ..self.form_api.clone()
        };

        std::fs::create_dir_all(data_dir)?;
        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Local blob-store root
    pub fn local_store_root(&self, data_dir: &Path) -> PathBuf {
        self.storage
            .local_root
            .clone()
            .unwrap_or_else(|| data_dir.join("store"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();

        assert_eq!(config.payment.org_id, "33");
        assert_eq!(config.payment.bank, "COUNTY");
        assert_eq!(config.campaigns.campaign_id(Category::Mileage, SchemaVersion::New), 173261);
        assert_eq!(config.run.archived_window_weeks, 7);
        assert!(config.run.upload_audit_workbook);
        assert_eq!(config.storage.backend, StorageBackend::Drive);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"storage": {"backend": "local", "completedFolder": "out"}, "payment": {"bank": "CITY"}}"#,
        )
        .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.completed_folder, "out");
        assert_eq!(config.storage.archived_folder, "archived");
        assert_eq!(config.payment.bank, "CITY");
        assert_eq!(config.payment.comment, "REIMB EXPENSE");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "REIMBURSE_FORM_API_KEY" => Some("secret".to_string()),
            "REIMBURSE_FORM_API_URL" => Some("http://127.0.0.1:9000".to_string()),
            "REIMBURSE_DRIVE_TOKEN" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.form_api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.form_api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.storage.drive_access_token, None);
    }

    #[test]
    fn test_save_preserves_unknown_fields_and_secrets() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("settings.json"),
            r#"{"formApi": {"apiKey": "from-file"}, "notes": "keep me"}"#,
        )
        .unwrap();

        let mut config = Config::load(temp.path()).unwrap();
        config.form_api.api_key = Some("from-env".to_string());
        config.payment.comment = "TRAVEL".to_string();
        config.save(temp.path()).unwrap();

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(temp.path().join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["notes"], "keep me");
        assert_eq!(saved["formApi"]["apiKey"], "from-file");
        assert_eq!(saved["payment"]["comment"], "TRAVEL");
    }
}
