//! Ledger CSV export for local inspection

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::columns::{LEDGER_AMOUNT, LEDGER_COLUMNS};
use crate::domain::LedgerRow;

/// Payment-template columns; amounts always carry two decimals
pub fn write_ledger<W: Write>(rows: &[LedgerRow], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(LEDGER_COLUMNS)?;
    for row in rows {
        let record: Vec<String> = LEDGER_COLUMNS
            .iter()
            .map(|column| {
                if *column == LEDGER_AMOUNT {
                    format!("{:.2}", row.amount)
                } else {
                    row.cell(column).as_text()
                }
            })
            .collect();
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn export_ledger(rows: &[LedgerRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_ledger(rows, file)
}
