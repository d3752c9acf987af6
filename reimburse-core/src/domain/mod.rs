//! Core domain entities
//!
//! Pure data structures for every stage of a run: raw form responses,
//! normalized category records, roster rows, reconciled records, ledger
//! rows and the styled workbook handed to the sink. No I/O here.

mod category;
pub mod columns;
mod event;
mod form;
mod ledger;
mod reconciled;
pub mod result;
mod roster;
mod value;
mod workbook;

pub use category::{AccountSplit, Category, CategoryRecord, SchemaVersion};
pub use event::LogEvent;
pub use form::{FieldMapping, RawField, RawRecord};
pub use ledger::LedgerRow;
pub use reconciled::{EmployeeId, MatchStatus, ReconciledRecord};
pub use result::{Error, Outcome, Result};
pub use roster::RosterRecord;
pub use value::{format_number, Value, NOT_AVAILABLE};
pub use workbook::{Annotation, Fill, StyledCell, StyledSheet, StyledWorkbook};
