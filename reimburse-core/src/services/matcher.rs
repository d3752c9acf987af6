//! Identity matcher - joins category records against the roster
//!
//! Identifiers are cleaned to integers on both sides. Submissions whose
//! identifier cannot be cleaned never join; they are carried through as
//! invalid-identifier rows tagged `Not Found` so every submission still
//! shows up exactly once in the reconciled table.

use std::collections::{HashMap, HashSet};

use crate::domain::{
    AccountSplit, Category, CategoryRecord, EmployeeId, Error, MatchStatus, Outcome,
    ReconciledRecord, Result, RosterRecord, Value,
};
use crate::ports::RunObserver;

/// Strip non-digits and read what is left as an integer.
///
/// Blank, letter-only and overflowing inputs give `None`, never an error.
/// Integral spreadsheet numbers are read as their integer value.
pub fn clean_identifier(raw: &Value) -> Option<u64> {
    match raw {
        Value::Missing => None,
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Some(*n as u64),
        other => {
            let digits: String = other.as_text().chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                None
            } else {
                digits.parse::<u64>().ok()
            }
        }
    }
}

/// Classify a submitted identifier
pub fn classify_identifier(raw: &Value) -> EmployeeId {
    match clean_identifier(raw) {
        Some(id) => EmployeeId::Valid(id),
        None => match raw.trimmed() {
            Some(text) => EmployeeId::Invalid(text),
            None => EmployeeId::Missing,
        },
    }
}

/// Roster rows by cleaned identifier, first occurrence wins
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    by_id: HashMap<u64, RosterRecord>,
    records: Vec<RosterRecord>,
}

impl RosterIndex {
    pub fn build(roster: &[RosterRecord]) -> Outcome<Self> {
        let mut by_id = HashMap::new();
        let mut duplicates = 0usize;
        for record in roster {
            let Some(id) = clean_identifier(&record.employee_id) else {
                continue;
            };
            if by_id.contains_key(&id) {
                duplicates += 1;
            } else {
                by_id.insert(id, record.clone());
            }
        }
        let index = Self {
            by_id,
            records: roster.to_vec(),
        };
        if duplicates > 0 {
            Outcome::degraded(
                index,
                format!("roster lists {} duplicate employee id(s); first row kept", duplicates),
            )
        } else {
            Outcome::clean(index)
        }
    }

    pub fn get(&self, id: u64) -> Option<&RosterRecord> {
        self.by_id.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// A submission with its cleaned identifier
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub record: CategoryRecord,
    pub employee_id: EmployeeId,
}

/// Submissions split into joinable rows and invalid-identifier rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedCategory {
    pub joinable: Vec<PreparedRecord>,
    pub invalid: Vec<PreparedRecord>,
}

/// Clean identifiers and split out rows that cannot join.
///
/// Rows with no field answered at all are dropped first.
pub fn prepare(records: Vec<CategoryRecord>) -> PreparedCategory {
    let mut prepared = PreparedCategory::default();
    for record in records.into_iter().filter(|r| !is_empty_record(r)) {
        let employee_id = classify_identifier(&record.employee_id);
        let row = PreparedRecord {
            record,
            employee_id,
        };
        match row.employee_id {
            EmployeeId::Valid(_) => prepared.joinable.push(row),
            _ => prepared.invalid.push(row),
        }
    }
    prepared
}

fn is_empty_record(record: &CategoryRecord) -> bool {
    record.invoice_date.is_blank()
        && record.employee_id.is_blank()
        && record.first.is_blank()
        && record.last.is_blank()
        && record
            .accounts
            .iter()
            .all(|a| a.code.is_blank() && a.total.is_blank())
        && record.total_reimbursement.is_blank()
        && record.email.is_blank()
        && record.invoice_number.trim().is_empty()
        && record.extras.iter().all(|(_, v)| v.is_blank())
}

/// Title case: a letter is upper-cased when it follows a
/// non-letter, lower-cased otherwise.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    out
}

fn display_name(value: &Value) -> Value {
    match value.trimmed() {
        Some(name) => Value::Text(title_case(&name.to_lowercase())),
        None => Value::Missing,
    }
}

fn prefer(roster: Option<&Value>, submitted: &Value) -> Value {
    match roster {
        Some(value) if !value.is_blank() => value.clone(),
        _ => submitted.clone(),
    }
}

fn reconcile(
    row: &PreparedRecord,
    roster: Option<&RosterRecord>,
    include_third_account_code: bool,
) -> ReconciledRecord {
    let source = &row.record;
    let mut accounts: [AccountSplit; 3] = source.accounts.clone();
    if !include_third_account_code {
        accounts[2] = AccountSplit::default();
    }

    let mut reconciled = ReconciledRecord {
        category: source.category,
        org_id: roster.map(|r| r.org_id.clone()).unwrap_or_default(),
        invoice_number: source.invoice_number.clone(),
        invoice_date: source.invoice_date.clone(),
        employee_id: row.employee_id.clone(),
        first: prefer(roster.map(|r| &r.first), &source.first),
        last: prefer(roster.map(|r| &r.last), &source.last),
        email: roster.map(|r| r.email.clone()).unwrap_or_default(),
        accounts,
        total_reimbursement: source.total_reimbursement.clone(),
        emp_status: roster.map(|r| r.emp_status.clone()).unwrap_or_default(),
        match_status: None,
    };
    reconciled.match_status = Some(reconciled.computed_status());
    reconciled
}

/// Join one category against the roster.
///
/// Joined rows come first, then invalid-identifier rows whose identifier
/// did not already join. Rows with no identifier and no name are dropped;
/// rows with no identifier are de-duplicated by name within the category.
pub fn merge(
    prepared: &PreparedCategory,
    roster: &RosterIndex,
    category: Category,
    include_third_account_code: bool,
) -> Result<Vec<ReconciledRecord>> {
    if let Some(stray) = prepared
        .joinable
        .iter()
        .chain(prepared.invalid.iter())
        .find(|r| r.record.category != category)
    {
        return Err(Error::validation(format!(
            "{} record found while merging {}",
            stray.record.category, category
        )));
    }

    let mut merged: Vec<ReconciledRecord> = prepared
        .joinable
        .iter()
        .map(|row| {
            let roster_row = match &row.employee_id {
                EmployeeId::Valid(id) => roster.get(*id),
                _ => None,
            };
            reconcile(row, roster_row, include_third_account_code)
        })
        .collect();

    let matched_keys: HashSet<String> = merged.iter().map(|r| r.employee_id.key()).collect();
    for row in &prepared.invalid {
        if row.employee_id.is_present() && matched_keys.contains(&row.employee_id.key()) {
            continue;
        }
        let mut reconciled = reconcile(row, None, include_third_account_code);
        reconciled.match_status = Some(MatchStatus::NotFound);
        merged.push(reconciled);
    }

    merged.retain(|r| r.employee_id.is_present() || !r.first.is_blank() || !r.last.is_blank());

    let mut with_id = Vec::new();
    let mut without_id = Vec::new();
    let mut seen_names = HashSet::new();
    for mut record in merged {
        record.first = display_name(&record.first);
        record.last = display_name(&record.last);
        if record.employee_id.is_present() {
            with_id.push(record);
        } else {
            let key = (
                record.first.as_text().to_lowercase(),
                record.last.as_text().to_lowercase(),
                record.category,
            );
            if seen_names.insert(key) {
                without_id.push(record);
            }
        }
    }
    with_id.extend(without_id);
    Ok(with_id)
}

/// Merge all three categories and concatenate them in category order.
///
/// A category that fails to merge contributes nothing and is reported;
/// the others still go through. Match status is recomputed on the
/// combined rows.
pub fn merge_all(
    expense: Vec<CategoryRecord>,
    mileage: Vec<CategoryRecord>,
    conference: Vec<CategoryRecord>,
    roster: &RosterIndex,
    observer: &dyn RunObserver,
) -> Vec<ReconciledRecord> {
    let mut combined = Vec::new();
    for (category, records) in [
        (Category::Expense, expense),
        (Category::Mileage, mileage),
        (Category::Conference, conference),
    ] {
        let prepared = prepare(records);
        match merge(
            &prepared,
            roster,
            category,
            category.includes_third_account_code(),
        ) {
            Ok(rows) => combined.extend(rows),
            Err(e) => observer.anomaly("match", &format!("{} merge failed: {}", category, e)),
        }
    }

    for record in &mut combined {
        record.match_status = Some(record.computed_status());
    }
    combined
}
