//! Submissions joined against the roster

use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::{AccountSplit, Category};
use super::columns::{
    ACCOUNT_CODES, ACCOUNT_TOTALS, EMAIL_ROSTER, EMPLOYEE_ID, EMP_STATUS, FIRST, FORM,
    INVOICE_DATE, INVOICE_NUMBER, LAST, MATCH_STATUS, MERGED_COLUMNS, ORG_ID, TOTAL_REIMBURSEMENT,
};
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    Matched,
    #[serde(rename = "Not Found")]
    NotFound,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "Matched",
            MatchStatus::NotFound => "Not Found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Matched" => Some(MatchStatus::Matched),
            "Not Found" => Some(MatchStatus::NotFound),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted employee identifier after cleaning
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EmployeeId {
    /// Digits recovered from the submission
    Valid(u64),
    /// Text with no recoverable digits, kept verbatim
    Invalid(String),
    Missing,
}

impl EmployeeId {
    pub fn is_present(&self) -> bool {
        !matches!(self, EmployeeId::Missing)
    }

    /// Join/dedup key. Valid ids render without leading zeros.
    pub fn key(&self) -> String {
        match self {
            EmployeeId::Valid(id) => id.to_string(),
            EmployeeId::Invalid(raw) => raw.clone(),
            EmployeeId::Missing => String::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EmployeeId::Valid(id) => Value::Number(*id as f64),
            EmployeeId::Invalid(raw) => Value::Text(raw.clone()),
            EmployeeId::Missing => Value::Missing,
        }
    }
}

/// A submission after the roster join, in the merged column set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledRecord {
    pub category: Category,
    pub org_id: Value,
    pub invoice_number: String,
    pub invoice_date: Value,
    pub employee_id: EmployeeId,
    pub first: Value,
    pub last: Value,
    pub email: Value,
    pub accounts: [AccountSplit; 3],
    pub total_reimbursement: Value,
    pub emp_status: Value,
    /// `None` for rows that never went through matching
    pub match_status: Option<MatchStatus>,
}

impl ReconciledRecord {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            org_id: Value::Missing,
            invoice_number: String::new(),
            invoice_date: Value::Missing,
            employee_id: EmployeeId::Missing,
            first: Value::Missing,
            last: Value::Missing,
            email: Value::Missing,
            accounts: Default::default(),
            total_reimbursement: Value::Missing,
            emp_status: Value::Missing,
            match_status: None,
        }
    }

    /// Matched iff an identifier is present and the roster supplied an email
    pub fn computed_status(&self) -> MatchStatus {
        if self.employee_id.is_present() && !self.email.is_blank() {
            MatchStatus::Matched
        } else {
            MatchStatus::NotFound
        }
    }

    pub fn cell(&self, column: &str) -> Value {
        if let Some(slot) = ACCOUNT_CODES.iter().position(|c| *c == column) {
            return self.accounts[slot].code.clone();
        }
        if let Some(slot) = ACCOUNT_TOTALS.iter().position(|c| *c == column) {
            return self.accounts[slot].total.clone();
        }
        match column {
            ORG_ID => self.org_id.clone(),
            INVOICE_NUMBER => Value::Text(self.invoice_number.clone()),
            INVOICE_DATE => self.invoice_date.clone(),
            EMPLOYEE_ID => self.employee_id.to_value(),
            FIRST => self.first.clone(),
            LAST => self.last.clone(),
            EMAIL_ROSTER => self.email.clone(),
            TOTAL_REIMBURSEMENT => self.total_reimbursement.clone(),
            EMP_STATUS => self.emp_status.clone(),
            FORM => Value::text(self.category.as_str()),
            MATCH_STATUS => self
                .match_status
                .map(|s| Value::text(s.as_str()))
                .unwrap_or_default(),
            _ => Value::Missing,
        }
    }

    /// Cells in merged column order
    pub fn row(&self) -> Vec<Value> {
        MERGED_COLUMNS.iter().map(|c| self.cell(c)).collect()
    }
}
