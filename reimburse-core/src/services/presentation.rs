//! Presentation writer - tables to styled workbooks
//!
//! Owns the highlight rules only. Whole rows are flagged when the payee is
//! blank or the record was not found on the roster. Account-code cells are
//! flagged from the expander's flags; strict mode (the upload ledger) also
//! re-runs the validator on every account-code cell.

use crate::domain::columns::{
    ACCOUNT_CODES, LEDGER_ACCOUNT, LEDGER_COLUMNS, MATCH_STATUS, MERGED_COLUMNS, PAYEE_NAME,
};
use crate::domain::{
    Annotation, Category, CategoryRecord, Fill, LedgerRow, MatchStatus, ReconciledRecord,
    RosterRecord, StyledCell, StyledSheet, StyledWorkbook, Value,
};
use crate::services::expander;

pub const HIGHLIGHT_COLUMN: &str = "Highlight_Account";
pub const LEGEND_NOT_FOUND: &str =
    "Not Found (Employee ID Missing or Incorrect Account Code Format)";
pub const LEGEND_MATCHED: &str = "Matched";
pub const MERGED_SHEET: &str = "Merged";
pub const ROSTER_SHEET: &str = "Roster";

/// Distance from the last data column to the legend swatch
const LEGEND_GAP: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRules {
    /// Validate every account-code cell instead of trusting row flags
    pub strict: bool,
    pub legend: bool,
}

impl HighlightRules {
    /// Merged review sheet
    pub const REVIEW: HighlightRules = HighlightRules {
        strict: false,
        legend: true,
    };
    /// Payment-upload ledger
    pub const LEDGER: HighlightRules = HighlightRules {
        strict: true,
        legend: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub cells: Vec<Value>,
    pub match_status: Option<MatchStatus>,
    /// Columns the expander flagged on this row
    pub flagged_columns: Vec<usize>,
}

/// A table plus the per-row review data the highlight rules read
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ReviewRow>,
}

fn is_account_code_column(name: &str) -> bool {
    name.starts_with("Account") && !name.contains("Total")
}

fn is_bookkeeping_column(name: &str) -> bool {
    name == MATCH_STATUS || name == HIGHLIGHT_COLUMN
}

/// Apply the highlight rules and drop the bookkeeping columns
pub fn style_table(table: &ReviewTable, rules: HighlightRules) -> StyledSheet {
    let kept: Vec<usize> = (0..table.columns.len())
        .filter(|i| !is_bookkeeping_column(&table.columns[*i]))
        .collect();
    let account_columns: Vec<usize> = (0..table.columns.len())
        .filter(|i| is_account_code_column(&table.columns[*i]))
        .collect();
    let payee_column = table.columns.iter().position(|c| c == PAYEE_NAME);

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let cell = |i: usize| row.cells.get(i).cloned().unwrap_or_default();
            let blank_payee = payee_column.map(|i| cell(i).is_blank()).unwrap_or(false);
            let whole_row = blank_payee || row.match_status == Some(MatchStatus::NotFound);

            kept.iter()
                .map(|&i| {
                    let value = cell(i);
                    let flagged = whole_row
                        || (account_columns.contains(&i)
                            && (row.flagged_columns.contains(&i)
                                || (rules.strict
                                    && !expander::is_valid_account_code(&value.as_text()))));
                    StyledCell {
                        value,
                        fill: flagged.then_some(Fill::Flagged),
                    }
                })
                .collect()
        })
        .collect();

    let header: Vec<String> = kept.iter().map(|&i| table.columns[i].clone()).collect();
    let mut annotations = Vec::new();
    if rules.legend {
        let swatch = header.len() as u16 + LEGEND_GAP;
        annotations.push(Annotation {
            row: 0,
            col: swatch,
            value: Value::Missing,
            fill: Some(Fill::Flagged),
        });
        annotations.push(Annotation {
            row: 0,
            col: swatch + 1,
            value: Value::text(LEGEND_NOT_FOUND),
            fill: None,
        });
        annotations.push(Annotation {
            row: 1,
            col: swatch + 1,
            value: Value::text(LEGEND_MATCHED),
            fill: None,
        });
    }

    StyledSheet {
        name: table.name.clone(),
        header,
        header_fill: Some(Fill::Header),
        rows,
        annotations,
    }
}

/// Reconciled records as the merged review table
pub fn merged_review_table(records: &[ReconciledRecord]) -> ReviewTable {
    let code_columns: Vec<usize> = ACCOUNT_CODES
        .iter()
        .filter_map(|name| MERGED_COLUMNS.iter().position(|c| c == name))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            let flags = expander::account_highlights(record);
            let flagged_columns: Vec<usize> = code_columns
                .iter()
                .zip(flags)
                .filter(|(_, flagged)| *flagged)
                .map(|(column, _)| *column)
                .collect();
            ReviewRow {
                cells: record.row(),
                match_status: record.match_status,
                flagged_columns,
            }
        })
        .collect();

    ReviewTable {
        name: MERGED_SHEET.to_string(),
        columns: MERGED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

/// Ledger rows as a review table in payment-template order
pub fn ledger_review_table(rows: &[LedgerRow]) -> ReviewTable {
    let account_column = LEDGER_COLUMNS.iter().position(|c| *c == LEDGER_ACCOUNT);
    ReviewTable {
        name: MERGED_SHEET.to_string(),
        columns: LEDGER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| ReviewRow {
                cells: row.row(),
                match_status: row.match_status,
                flagged_columns: account_column.filter(|_| row.highlight).into_iter().collect(),
            })
            .collect(),
    }
}

/// Plain audit sheet for one category; extras follow the fixed columns
pub fn category_sheet(category: Category, records: &[CategoryRecord]) -> StyledSheet {
    let mut columns: Vec<String> = category
        .sheet_columns()
        .iter()
        .map(|c| c.to_string())
        .collect();
    for record in records {
        for (label, _) in &record.extras {
            if !columns.contains(label) {
                columns.push(label.clone());
            }
        }
    }

    let rows = records
        .iter()
        .map(|record| columns.iter().map(|c| record.get(c)).collect())
        .collect();
    StyledSheet::plain(category.as_str(), columns, rows)
}

pub fn roster_sheet(roster: &[RosterRecord]) -> StyledSheet {
    StyledSheet::plain(
        ROSTER_SHEET,
        RosterRecord::header(),
        roster.iter().map(|r| r.cells()).collect(),
    )
}

/// Tables backing the audit workbook
pub struct AuditTables<'a> {
    pub expense: &'a [CategoryRecord],
    pub mileage: &'a [CategoryRecord],
    pub conference: &'a [CategoryRecord],
    pub roster: &'a [RosterRecord],
    pub reconciled: &'a [ReconciledRecord],
}

/// Per-category sheets, the roster and the styled merged sheet
pub fn audit_workbook(file_name: impl Into<String>, tables: &AuditTables<'_>) -> StyledWorkbook {
    StyledWorkbook {
        file_name: file_name.into(),
        sheets: vec![
            category_sheet(Category::Expense, tables.expense),
            category_sheet(Category::Mileage, tables.mileage),
            category_sheet(Category::Conference, tables.conference),
            roster_sheet(tables.roster),
            style_table(&merged_review_table(tables.reconciled), HighlightRules::REVIEW),
        ],
    }
}

/// Single strict-styled ledger sheet
pub fn ledger_workbook(file_name: impl Into<String>, ledger: &[LedgerRow]) -> StyledWorkbook {
    StyledWorkbook {
        file_name: file_name.into(),
        sheets: vec![style_table(&ledger_review_table(ledger), HighlightRules::LEDGER)],
    }
}
