//! Spreadsheet ports
//!
//! The engine builds workbooks as plain data ([`StyledWorkbook`]) and
//! reads the roster as rows of cells. File formats live in adapters.

use crate::domain::result::Result;
use crate::domain::{StyledWorkbook, Value};

/// Renders a styled workbook to file bytes
pub trait WorkbookSink: Send + Sync {
    /// File extension including the dot (e.g., ".xlsx")
    fn extension(&self) -> &str;

    fn mime_type(&self) -> &str;

    fn render(&self, workbook: &StyledWorkbook) -> Result<Vec<u8>>;
}

/// Reads the first sheet of a workbook as rows of cells, header included
pub trait WorkbookSource: Send + Sync {
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<Value>>>;
}
