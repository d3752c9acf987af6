//! Reimbursement categories and their normalized records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::columns::{
    ACCOUNT_CODES, ACCOUNT_TOTALS, COMMON_COLUMNS, EMAIL_API, EMPLOYEE_ID, FIRST, INVOICE_DATE,
    INVOICE_NUMBER, LAST, TOTAL_REIMBURSEMENT,
};
use super::result::Error;
use super::value::Value;

/// A reimbursement form type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Expense,
    Mileage,
    Conference,
}

impl Category {
    /// Processing and output order
    pub const ALL: [Category; 3] = [Category::Expense, Category::Mileage, Category::Conference];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Expense => "Expense",
            Category::Mileage => "Mileage",
            Category::Conference => "Conference",
        }
    }

    /// Whether the third account-code pair is carried into the reconciled
    /// table. Conference submissions keep it only on their own sheet.
    pub fn includes_third_account_code(&self) -> bool {
        !matches!(self, Category::Conference)
    }

    /// Columns of this category's audit sheet, before extras
    pub fn sheet_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = COMMON_COLUMNS.to_vec();
        if *self == Category::Expense {
            columns.push(EMAIL_API);
        }
        columns.push(INVOICE_NUMBER);
        columns
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "expense" => Ok(Category::Expense),
            "mileage" => Ok(Category::Mileage),
            "conference" => Ok(Category::Conference),
            other => Err(Error::validation(format!("unknown category '{}'", other))),
        }
    }
}

/// Which campaign generation a payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    Old,
    New,
}

impl SchemaVersion {
    /// Old payloads are unioned first
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::Old, SchemaVersion::New];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::Old => "old",
            SchemaVersion::New => "new",
        }
    }
}

/// One (account code, amount) pair as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountSplit {
    pub code: Value,
    pub total: Value,
}

impl AccountSplit {
    pub fn new(code: impl Into<Value>, total: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            total: total.into(),
        }
    }
}

/// A normalized submission for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub category: Category,
    pub invoice_date: Value,
    pub employee_id: Value,
    pub first: Value,
    pub last: Value,
    pub accounts: [AccountSplit; 3],
    pub total_reimbursement: Value,
    /// Submitter email, collected on the expense form only
    pub email: Value,
    pub invoice_number: String,
    /// Targeted fields with no semantic column, keyed by form label
    pub extras: Vec<(String, Value)>,
}

impl CategoryRecord {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            invoice_date: Value::Missing,
            employee_id: Value::Missing,
            first: Value::Missing,
            last: Value::Missing,
            accounts: Default::default(),
            total_reimbursement: Value::Missing,
            email: Value::Missing,
            invoice_number: String::new(),
            extras: Vec::new(),
        }
    }

    /// Read a semantic or extra column by name
    pub fn get(&self, column: &str) -> Value {
        if let Some(slot) = ACCOUNT_CODES.iter().position(|c| *c == column) {
            return self.accounts[slot].code.clone();
        }
        if let Some(slot) = ACCOUNT_TOTALS.iter().position(|c| *c == column) {
            return self.accounts[slot].total.clone();
        }
        match column {
            INVOICE_DATE => self.invoice_date.clone(),
            EMPLOYEE_ID => self.employee_id.clone(),
            FIRST => self.first.clone(),
            LAST => self.last.clone(),
            TOTAL_REIMBURSEMENT => self.total_reimbursement.clone(),
            EMAIL_API => self.email.clone(),
            INVOICE_NUMBER => Value::Text(self.invoice_number.clone()),
            other => self
                .extras
                .iter()
                .find(|(label, _)| label == other)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        }
    }

    /// Write a semantic column. Unknown names are kept as extras.
    pub fn set(&mut self, column: &str, value: Value) {
        if let Some(slot) = ACCOUNT_CODES.iter().position(|c| *c == column) {
            self.accounts[slot].code = value;
            return;
        }
        if let Some(slot) = ACCOUNT_TOTALS.iter().position(|c| *c == column) {
            self.accounts[slot].total = value;
            return;
        }
        match column {
            INVOICE_DATE => self.invoice_date = value,
            EMPLOYEE_ID => self.employee_id = value,
            FIRST => self.first = value,
            LAST => self.last = value,
            TOTAL_REIMBURSEMENT => self.total_reimbursement = value,
            EMAIL_API => self.email = value,
            INVOICE_NUMBER => self.invoice_number = value.as_text(),
            other => match self.extras.iter_mut().find(|(label, _)| label == other) {
                Some((_, existing)) => *existing = value,
                None => self.extras.push((other.to_string(), value)),
            },
        }
    }
}
