//! In-memory workbook handed to the spreadsheet sink

use serde::Serialize;

use super::value::Value;

/// Cell background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Fill {
    Header,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledCell {
    pub value: Value,
    pub fill: Option<Fill>,
}

impl StyledCell {
    pub fn plain(value: Value) -> Self {
        Self { value, fill: None }
    }
}

/// A cell placed outside the data grid (legend entries)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub row: u32,
    pub col: u16,
    pub value: Value,
    pub fill: Option<Fill>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledSheet {
    pub name: String,
    pub header: Vec<String>,
    pub header_fill: Option<Fill>,
    pub rows: Vec<Vec<StyledCell>>,
    pub annotations: Vec<Annotation>,
}

impl StyledSheet {
    /// Unstyled sheet straight from a table
    pub fn plain(name: impl Into<String>, header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            header,
            header_fill: None,
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(StyledCell::plain).collect())
                .collect(),
            annotations: Vec::new(),
        }
    }

    /// Number of data rows carrying at least one flagged cell
    pub fn flagged_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.iter().any(|c| c.fill == Some(Fill::Flagged)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyledWorkbook {
    pub file_name: String,
    pub sheets: Vec<StyledSheet>,
}

impl StyledWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&StyledSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}
