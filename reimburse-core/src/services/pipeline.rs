//! Reconcile service - one full run from form responses to published workbooks
//!
//! fetch -> normalize -> match -> expand -> render -> publish. Only fatal
//! errors (credentials, storage while publishing) end a run; everything
//! else is reported to the observer and the run carries on with what it has.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::result::{Error, Outcome, Result};
use crate::domain::{
    Category, CategoryRecord, LedgerRow, LogEvent, MatchStatus, ReconciledRecord, RosterRecord,
    SchemaVersion, StyledWorkbook,
};
use crate::ports::{
    BlobStore, FormResponseSource, ResponseQuery, RunObserver, UploadedFile, WorkbookSink,
    WorkbookSource,
};
use crate::services::{expander, matcher, normalizer, presentation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Pending responses, published to the completed folder
    Completed,
    /// Responses completed inside the archive window
    Archived,
}

impl RunMode {
    pub const ALL: [RunMode; 2] = [RunMode::Completed, RunMode::Archived];

    /// Also the single-flight job name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Completed => "completed",
            RunMode::Archived => "archived",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(RunMode::Completed),
            "archived" => Ok(RunMode::Archived),
            other => Err(Error::validation(format!("Unknown run mode: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Render everything but upload nothing
    pub dry_run: bool,
}

/// A rendered output file
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub expense: usize,
    pub mileage: usize,
    pub conference: usize,
}

impl CategoryCounts {
    fn set(&mut self, category: Category, count: usize) {
        match category {
            Category::Expense => self.expense = count,
            Category::Mileage => self.mileage = count,
            Category::Conference => self.conference = count,
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub started_at: DateTime<Local>,
    pub dry_run: bool,
    pub submissions: CategoryCounts,
    pub roster_rows: usize,
    pub reconciled: usize,
    pub matched: usize,
    pub not_found: usize,
    pub ledger_rows: usize,
    pub flagged_rows: usize,
    pub uploaded: Vec<UploadedFile>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub rendered: Vec<RenderedFile>,
    #[serde(skip)]
    pub ledger: Vec<LedgerRow>,
}

/// Tags every event with the run id and job, and keeps anomaly text for the report
struct RunScope<'a> {
    inner: &'a dyn RunObserver,
    run_id: String,
    job: &'static str,
    warnings: Mutex<Vec<String>>,
}

impl<'a> RunScope<'a> {
    fn new(inner: &'a dyn RunObserver, mode: RunMode) -> Self {
        Self {
            inner,
            run_id: Uuid::new_v4().to_string(),
            job: mode.as_str(),
            warnings: Mutex::new(Vec::new()),
        }
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl RunObserver for RunScope<'_> {
    fn record(&self, mut event: LogEvent) {
        if event.event == "anomaly" {
            if let (Some(message), Ok(mut warnings)) = (&event.error_message, self.warnings.lock()) {
                let stage = event.stage.as_deref().unwrap_or("run");
                warnings.push(format!("{}: {}", stage, message));
            }
        }
        event.job.get_or_insert_with(|| self.job.to_string());
        event.run_id.get_or_insert_with(|| self.run_id.clone());
        self.inner.record(event);
    }
}

/// Output names share one suffix so a run's files sort together
pub fn output_suffix(mode: RunMode, now: DateTime<Local>, window_weeks: u32) -> String {
    match mode {
        RunMode::Completed => now.format("%Y%m%d%H%M%S").to_string(),
        RunMode::Archived => {
            let start = now - Duration::weeks(i64::from(window_weeks));
            format!("{}-{}", start.format("%Y%m%d"), now.format("%Y%m%d"))
        }
    }
}

/// Everything one run produced before publishing
struct RunTables {
    categories: Vec<(Category, Vec<CategoryRecord>)>,
    roster: Vec<RosterRecord>,
    reconciled: Vec<ReconciledRecord>,
    ledger: Vec<LedgerRow>,
}

impl RunTables {
    fn category(&self, category: Category) -> &[CategoryRecord] {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }
}

pub struct ReconcileService {
    config: Arc<Config>,
    forms: Arc<dyn FormResponseSource>,
    store: Arc<dyn BlobStore>,
    sink: Arc<dyn WorkbookSink>,
    source: Arc<dyn WorkbookSource>,
    observer: Arc<dyn RunObserver>,
}

impl ReconcileService {
    pub fn new(
        config: Arc<Config>,
        forms: Arc<dyn FormResponseSource>,
        store: Arc<dyn BlobStore>,
        sink: Arc<dyn WorkbookSink>,
        source: Arc<dyn WorkbookSource>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            config,
            forms,
            store,
            sink,
            source,
            observer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline once.
    ///
    /// `run_completed` or `run_failed` is always logged. A failed run leaves
    /// no uploads from itself behind.
    pub fn run(&self, mode: RunMode, now: DateTime<Local>, options: RunOptions) -> Result<RunReport> {
        let scope = RunScope::new(self.observer.as_ref(), mode);
        scope.record(LogEvent::new("run_started").with_stage(if options.dry_run {
            "dry_run"
        } else {
            "publish"
        }));

        match self.run_scoped(&scope, mode, now, options) {
            Ok(mut report) => {
                report.warnings = scope.warnings();
                scope.record(LogEvent::new("run_completed"));
                Ok(report)
            }
            Err(e) => {
                scope.record(LogEvent::new("run_failed").with_error(e.to_string()));
                Err(e)
            }
        }
    }

    fn run_scoped(
        &self,
        scope: &RunScope<'_>,
        mode: RunMode,
        now: DateTime<Local>,
        options: RunOptions,
    ) -> Result<RunReport> {
        let tables = self.build_tables(scope, mode, now)?;

        let suffix = output_suffix(mode, now, self.config.run.archived_window_weeks);
        let ext = self.sink.extension();
        let ledger_book = presentation::ledger_workbook(
            format!("AP-Reimbursement Upload {}{}", suffix, ext),
            &tables.ledger,
        );
        let mut workbooks = vec![ledger_book];
        if self.config.run.upload_audit_workbook || options.dry_run {
            let audit = presentation::AuditTables {
                expense: tables.category(Category::Expense),
                mileage: tables.category(Category::Mileage),
                conference: tables.category(Category::Conference),
                roster: &tables.roster,
                reconciled: &tables.reconciled,
            };
            workbooks.push(presentation::audit_workbook(
                format!("Merged Data {}{}", suffix, ext),
                &audit,
            ));
        }

        let flagged_rows = workbooks[0]
            .sheet(presentation::MERGED_SHEET)
            .map(|s| s.flagged_rows())
            .unwrap_or(0);
        let rendered = self.render_all(&workbooks)?;

        let uploaded = if options.dry_run {
            Vec::new()
        } else {
            self.publish(scope, self.output_folder(mode), &rendered)?
        };

        let mut submissions = CategoryCounts::default();
        for (category, records) in &tables.categories {
            submissions.set(*category, records.len());
        }
        let matched = tables
            .reconciled
            .iter()
            .filter(|r| r.match_status == Some(MatchStatus::Matched))
            .count();

        Ok(RunReport {
            run_id: scope.run_id.clone(),
            mode,
            started_at: now,
            dry_run: options.dry_run,
            submissions,
            roster_rows: tables.roster.len(),
            reconciled: tables.reconciled.len(),
            matched,
            not_found: tables.reconciled.len() - matched,
            ledger_rows: tables.ledger.len(),
            flagged_rows,
            uploaded,
            warnings: Vec::new(),
            rendered: if options.dry_run { rendered } else { Vec::new() },
            ledger: tables.ledger,
        })
    }

    fn build_tables(
        &self,
        scope: &RunScope<'_>,
        mode: RunMode,
        now: DateTime<Local>,
    ) -> Result<RunTables> {
        let roster = self.load_roster()?;
        let roster_missing = roster.is_degraded();
        let roster = roster.observe(scope, "roster");

        let query = match mode {
            RunMode::Completed => ResponseQuery::Pending,
            RunMode::Archived => {
                let end = now.fixed_offset();
                ResponseQuery::Archived {
                    completed_at_start: end
                        - Duration::weeks(i64::from(self.config.run.archived_window_weeks)),
                    completed_at_end: end,
                }
            }
        };

        let mut categories = Vec::new();
        for category in Category::ALL {
            let mut records = Vec::new();
            for version in SchemaVersion::ALL {
                records.extend(self.fetch_category(scope, category, version, &query)?);
            }
            categories.push((category, records));
        }

        // Without a roster nothing can be matched, so nothing is reconciled
        if roster_missing && roster.is_empty() {
            return Ok(RunTables {
                categories,
                roster,
                reconciled: Vec::new(),
                ledger: Vec::new(),
            });
        }

        let index = matcher::RosterIndex::build(&roster).observe(scope, "match");
        let mut tables = categories.iter().map(|(_, records)| records.clone());
        let (expense, mileage, conference) = (
            tables.next().unwrap_or_default(),
            tables.next().unwrap_or_default(),
            tables.next().unwrap_or_default(),
        );
        let reconciled = matcher::merge_all(expense, mileage, conference, &index, scope);
        let ledger = expander::expand(&reconciled, &self.config.payment).observe(scope, "expand");

        Ok(RunTables {
            categories,
            roster,
            reconciled,
            ledger,
        })
    }

    /// Fetch and normalize one campaign; only credential failures propagate
    fn fetch_category(
        &self,
        scope: &RunScope<'_>,
        category: Category,
        version: SchemaVersion,
        query: &ResponseQuery,
    ) -> Result<Vec<CategoryRecord>> {
        let Some(schema) = self.config.schemas.get(category, version) else {
            scope.anomaly(
                "normalize",
                &format!("no form schema for {} {}", category, version.as_str()),
            );
            return Ok(Vec::new());
        };
        let campaign = self.config.campaigns.campaign_id(category, version);

        let raw = match self.forms.fetch_responses(campaign, query) {
            Ok(outcome) => outcome.observe(scope, "fetch"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                scope.anomaly("fetch", &format!("campaign {}: {}", campaign, e));
                Vec::new()
            }
        };
        scope.record(
            LogEvent::new("fetch_completed")
                .with_stage(version.as_str())
                .with_category(category.as_str()),
        );

        Ok(normalizer::normalize_payload(&raw, schema, scope))
    }

    /// Header row is replaced positionally; blank rows are skipped
    fn load_roster(&self) -> Result<Outcome<Vec<RosterRecord>>> {
        let storage = &self.config.storage;
        let id = match self.store.find(&storage.roster_folder, &storage.roster_file_name) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(Outcome::empty(format!(
                    "roster file '{}' not found",
                    storage.roster_file_name
                )))
            }
            Err(e) if matches!(e, Error::Auth(_)) => return Err(e),
            Err(e) => return Ok(Outcome::empty(format!("roster lookup failed: {}", e))),
        };

        let rows = match self
            .store
            .download(&id)
            .and_then(|bytes| self.source.read_rows(&bytes))
        {
            Ok(rows) => rows,
            Err(e) if matches!(e, Error::Auth(_)) => return Err(e),
            Err(e) => return Ok(Outcome::empty(format!("roster unreadable: {}", e))),
        };

        let roster = rows
            .iter()
            .skip(1)
            .filter(|row| !row.iter().all(|cell| cell.is_blank()))
            .map(|row| RosterRecord::from_cells(row))
            .collect();
        Ok(Outcome::clean(roster))
    }

    fn render_all(&self, workbooks: &[StyledWorkbook]) -> Result<Vec<RenderedFile>> {
        workbooks
            .iter()
            .map(|wb| {
                Ok(RenderedFile {
                    name: wb.file_name.clone(),
                    bytes: self.sink.render(wb)?,
                })
            })
            .collect()
    }

    fn output_folder(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Completed => &self.config.storage.completed_folder,
            RunMode::Archived => &self.config.storage.archived_folder,
        }
    }

    /// Upload every file under a staging name, promote the set, then clear
    /// out the previous run's files.
    ///
    /// Nothing under a final name is touched until every upload has landed,
    /// so a failed upload leaves the folder as it was.
    fn publish(
        &self,
        scope: &RunScope<'_>,
        folder: &str,
        files: &[RenderedFile],
    ) -> Result<Vec<UploadedFile>> {
        let previous = self.store.list_all(folder).map_err(as_storage)?;

        let mut staged: Vec<(UploadedFile, &str)> = Vec::new();
        for file in files {
            let staging = staging_name(&scope.run_id, &file.name);
            match self
                .store
                .upload(folder, &staging, self.sink.mime_type(), &file.bytes)
            {
                Ok(done) => staged.push((done, file.name.as_str())),
                Err(e) => {
                    self.discard(scope, staged.iter().map(|(done, _)| done));
                    return Err(as_storage(e));
                }
            }
        }

        let mut uploaded: Vec<UploadedFile> = Vec::new();
        let mut pending = staged.into_iter();
        while let Some((done, name)) = pending.next() {
            match self.store.rename(&done.id, name) {
                Ok(promoted) => {
                    scope.record(LogEvent::new("upload").with_stage("publish"));
                    uploaded.push(promoted);
                }
                Err(e) => {
                    let rest: Vec<UploadedFile> = pending.map(|(file, _)| file).collect();
                    self.discard(scope, std::iter::once(&done).chain(&rest));
                    return Err(as_storage(e));
                }
            }
        }

        for old in previous.iter().filter(|f| !f.is_folder()) {
            if uploaded.iter().any(|u| u.id == old.id) {
                continue;
            }
            if let Err(e) = self.store.trash(&old.id) {
                scope.anomaly("publish", &format!("could not trash {}: {}", old.name, e));
            }
        }
        Ok(uploaded)
    }

    /// Trash this run's staged uploads after a failed publish
    fn discard<'a>(&self, scope: &RunScope<'_>, files: impl IntoIterator<Item = &'a UploadedFile>) {
        for file in files {
            if let Err(e) = self.store.trash(&file.id) {
                scope.anomaly("publish", &format!("rollback of {} failed: {}", file.name, e));
            }
        }
    }
}

/// Hidden per-run name a file is uploaded under before it is promoted
fn staging_name(run_id: &str, name: &str) -> String {
    format!(".staging-{}-{}", run_id, name)
}

fn as_storage(e: Error) -> Error {
    match e {
        Error::Auth(_) | Error::Storage(_) => e,
        other => Error::storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawRecord, Value};
    use crate::ports::{MemoryObserver, StoredFile, FOLDER_MIME_TYPE};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;

    const VALID: &str = "123-4567-8-9012-3456-7890-123-4567-8901";

    #[derive(Default)]
    struct FakeForms {
        responses: HashMap<u64, Vec<RawRecord>>,
        fail_auth: bool,
    }

    impl FormResponseSource for FakeForms {
        fn name(&self) -> &str {
            "fake"
        }

        fn fetch_responses(&self, campaign_id: u64, _query: &ResponseQuery) -> Result<Outcome<Vec<RawRecord>>> {
            if self.fail_auth {
                return Err(Error::auth("HTTP 401"));
            }
            Ok(Outcome::clean(self.responses.get(&campaign_id).cloned().unwrap_or_default()))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<Vec<(StoredFile, String, Vec<u8>, bool)>>,
        reject_upload: Option<String>,
    }

    impl MemoryStore {
        fn put(&self, folder: &str, name: &str, mime: &str, bytes: Vec<u8>) -> String {
            let mut files = self.files.lock().unwrap();
            let id = format!("id-{}", files.len());
            files.push((
                StoredFile {
                    id: id.clone(),
                    name: name.to_string(),
                    mime_type: mime.to_string(),
                },
                folder.to_string(),
                bytes,
                false,
            ));
            id
        }

        fn live(&self, folder: &str) -> Vec<String> {
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, f, _, trashed)| f == folder && !trashed)
                .map(|(file, _, _, _)| file.name.clone())
                .collect()
        }
    }

    impl BlobStore for MemoryStore {
        fn name(&self) -> &str {
            "memory"
        }

        fn find(&self, folder_id: &str, name: &str) -> Result<Option<String>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .iter()
                .find(|(file, f, _, trashed)| f == folder_id && file.name == name && !trashed)
                .map(|(file, _, _, _)| file.id.clone()))
        }

        fn list_all(&self, folder_id: &str) -> Result<Vec<StoredFile>> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, f, _, trashed)| f == folder_id && !trashed)
                .map(|(file, _, _, _)| file.clone())
                .collect())
        }

        fn trash(&self, file_id: &str) -> Result<()> {
            let mut files = self.files.lock().unwrap();
            let entry = files
                .iter_mut()
                .find(|(file, _, _, _)| file.id == file_id)
                .ok_or_else(|| Error::not_found(file_id))?;
            entry.3 = true;
            Ok(())
        }

        fn download(&self, file_id: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .iter()
                .find(|(file, _, _, _)| file.id == file_id)
                .map(|(_, _, bytes, _)| bytes.clone())
                .ok_or_else(|| Error::not_found(file_id))
        }

        fn upload(&self, folder_id: &str, name: &str, mime_type: &str, bytes: &[u8]) -> Result<UploadedFile> {
            if self.reject_upload.as_deref().map_or(false, |part| name.contains(part)) {
                return Err(Error::api("quota exceeded"));
            }
            let id = self.put(folder_id, name, mime_type, bytes.to_vec());
            Ok(UploadedFile {
                link: format!("memory://{}", id),
                id,
                name: name.to_string(),
            })
        }

        fn rename(&self, file_id: &str, new_name: &str) -> Result<UploadedFile> {
            let mut files = self.files.lock().unwrap();
            let entry = files
                .iter_mut()
                .find(|(file, _, _, trashed)| file.id == file_id && !trashed)
                .ok_or_else(|| Error::not_found(file_id))?;
            entry.0.name = new_name.to_string();
            Ok(UploadedFile {
                link: format!("memory://{}", file_id),
                id: file_id.to_string(),
                name: new_name.to_string(),
            })
        }
    }

    /// Renders to JSON and reads rosters stored as JSON arrays of rows
    struct JsonBooks;

    impl WorkbookSink for JsonBooks {
        fn extension(&self) -> &str {
            ".json"
        }

        fn mime_type(&self) -> &str {
            "application/json"
        }

        fn render(&self, workbook: &StyledWorkbook) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(workbook)?)
        }
    }

    impl WorkbookSource for JsonBooks {
        fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
            let rows: Vec<Vec<serde_json::Value>> = serde_json::from_slice(bytes)?;
            Ok(rows
                .iter()
                .map(|row| row.iter().map(Value::from_json).collect())
                .collect())
        }
    }

    fn expense_submission() -> RawRecord {
        RawRecord::from_json(&json!({
            "id": 1,
            "fields": [
                {"number": 74, "label": "Date", "value": "05/01/2024"},
                {"number": 4, "label": "Employee ID", "value": "7"},
                {"number": 3, "label": "First Name", "value": "jane"},
                {"number": 2, "label": "Last Name", "value": "doe"},
                {"number": 60, "label": "Account 1", "value": VALID},
                {"number": 61, "label": "Account 1 Total", "value": "100"},
                {"number": 83, "label": "Total", "value": "100"},
                {"number": 9, "label": "Email", "value": "jane@example.org"}
            ]
        }))
    }

    fn roster_bytes() -> Vec<u8> {
        serde_json::to_vec(&json!([
            ["Org", "Last", "First", "Emp", "Status", "Email"],
            [33, "Doe", "Jane", 7, "Active", "jdoe@example.org"],
            [null, null, null, null, null, null]
        ]))
        .unwrap()
    }

    fn service(forms: FakeForms, store: Arc<MemoryStore>, observer: Arc<MemoryObserver>) -> ReconcileService {
        let config = Config::default();
        store.put(
            &config.storage.roster_folder,
            &config.storage.roster_file_name,
            "application/json",
            roster_bytes(),
        );
        ReconcileService::new(
            Arc::new(config),
            Arc::new(forms),
            store,
            Arc::new(JsonBooks),
            Arc::new(JsonBooks),
            observer,
        )
    }

    fn forms_with_expense() -> FakeForms {
        let mut forms = FakeForms::default();
        forms.responses.insert(173260, vec![expense_submission()]);
        forms
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_run_publishes_both_workbooks() {
        let store = Arc::new(MemoryStore::default());
        let observer = Arc::new(MemoryObserver::new());
        let svc = service(forms_with_expense(), store.clone(), observer.clone());

        let report = svc.run(RunMode::Completed, now(), RunOptions::default()).unwrap();

        assert_eq!(report.submissions.expense, 1);
        assert_eq!(report.roster_rows, 1);
        assert_eq!((report.reconciled, report.matched, report.not_found), (1, 1, 0));
        assert_eq!(report.ledger_rows, 1);
        assert_eq!(report.flagged_rows, 0);
        assert_eq!(report.ledger[0].invoice_number, "MAY 2024 10000");
        assert_eq!(report.ledger[0].payee_name, "Jane Doe");
        assert_eq!(
            store.live("completed"),
            vec![
                "AP-Reimbursement Upload 20240520093000.json".to_string(),
                "Merged Data 20240520093000.json".to_string(),
            ]
        );

        let events: Vec<String> = observer.events().into_iter().map(|e| e.event).collect();
        assert_eq!(events.first().map(String::as_str), Some("run_started"));
        assert_eq!(events.last().map(String::as_str), Some("run_completed"));
        assert!(observer
            .events()
            .iter()
            .all(|e| e.run_id.as_deref() == Some(report.run_id.as_str())));
    }

    #[test]
    fn test_second_run_replaces_previous_outputs() {
        let store = Arc::new(MemoryStore::default());
        let observer = Arc::new(MemoryObserver::new());
        let svc = service(forms_with_expense(), store.clone(), observer);
        store.put("completed", "Subfolder", FOLDER_MIME_TYPE, Vec::new());

        svc.run(RunMode::Completed, now(), RunOptions::default()).unwrap();
        let later = now() + Duration::hours(1);
        svc.run(RunMode::Completed, later, RunOptions::default()).unwrap();

        let live = store.live("completed");
        assert_eq!(live.len(), 3);
        assert!(live.contains(&"Subfolder".to_string()));
        assert!(live.iter().all(|n| n == "Subfolder" || n.contains("20240520103000")));
    }

    #[test]
    fn test_failed_upload_rolls_back() {
        let store = Arc::new(MemoryStore {
            reject_upload: Some("Merged Data".into()),
            ..MemoryStore::default()
        });
        let observer = Arc::new(MemoryObserver::new());
        let svc = service(forms_with_expense(), store.clone(), observer.clone());
        store.put("completed", "old.json", "application/json", Vec::new());

        let err = svc.run(RunMode::Completed, now(), RunOptions::default()).unwrap_err();

        assert!(err.is_fatal());
        // Previous output survives, nothing from this run does
        assert_eq!(store.live("completed"), vec!["old.json".to_string()]);
        assert!(observer.events().iter().any(|e| e.event == "run_failed"));
    }

    #[test]
    fn test_auth_failure_aborts_without_uploads() {
        let store = Arc::new(MemoryStore::default());
        let forms = FakeForms {
            fail_auth: true,
            ..FakeForms::default()
        };
        let svc = service(forms, store.clone(), Arc::new(MemoryObserver::new()));

        let err = svc.run(RunMode::Completed, now(), RunOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(store.live("completed").is_empty());
    }

    #[test]
    fn test_missing_roster_leaves_merged_and_ledger_empty() {
        let store = Arc::new(MemoryStore::default());
        let observer = Arc::new(MemoryObserver::new());
        let mut config = Config::default();
        config.storage.roster_file_name = "absent.xlsx".into();
        let svc = ReconcileService::new(
            Arc::new(config),
            Arc::new(forms_with_expense()),
            store.clone(),
            Arc::new(JsonBooks),
            Arc::new(JsonBooks),
            observer.clone(),
        );

        let report = svc.run(RunMode::Completed, now(), RunOptions::default()).unwrap();
        assert_eq!(report.roster_rows, 0);
        assert_eq!(report.submissions.expense, 1);
        assert_eq!(report.reconciled, 0);
        assert_eq!(report.ledger_rows, 0);
        assert_eq!(report.flagged_rows, 0);
        assert!(report.warnings.iter().any(|w| w.starts_with("roster:")));
    }

    #[test]
    fn test_dry_run_renders_without_uploading() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(forms_with_expense(), store.clone(), Arc::new(MemoryObserver::new()));

        let report = svc
            .run(RunMode::Archived, now(), RunOptions { dry_run: true })
            .unwrap();

        assert!(report.uploaded.is_empty());
        assert!(store.live("archived").is_empty());
        let names: Vec<_> = report.rendered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "AP-Reimbursement Upload 20240401-20240520.json",
                "Merged Data 20240401-20240520.json",
            ]
        );
    }

    #[test]
    fn test_run_mode_parsing() {
        assert_eq!("Archived".parse::<RunMode>().unwrap(), RunMode::Archived);
        assert!("weekly".parse::<RunMode>().is_err());
        assert_eq!(RunMode::Completed.to_string(), "completed");
    }
}
