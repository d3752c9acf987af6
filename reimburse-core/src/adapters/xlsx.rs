//! xlsx codec: calamine for reading, rust_xlsxwriter for writing

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};

use crate::domain::result::{Error, Result};
use crate::domain::{Fill, StyledCell, StyledSheet, StyledWorkbook, Value};
use crate::ports::{WorkbookSink, WorkbookSource, XLSX_MIME_TYPE};

const HEADER_FILL: u32 = 0xC6EFCE;
const FLAG_FILL: u32 = 0xFF6347;

fn xlsx_error(e: XlsxError) -> Error {
    Error::workbook(e.to_string())
}

fn cell_value(data: &Data) -> Value {
    match data {
        Data::Empty => Value::Missing,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => Value::text(s.clone()),
        Data::Bool(b) => Value::text(b.to_string()),
        Data::Error(e) => Value::text(format!("{:?}", e)),
        other => Value::text(other.to_string()),
    }
}

struct Formats {
    header: Format,
    flagged: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(HEADER_FILL)),
            flagged: Format::new().set_background_color(Color::RGB(FLAG_FILL)),
        }
    }

    fn for_fill(&self, fill: Option<Fill>) -> Option<&Format> {
        match fill {
            Some(Fill::Header) => Some(&self.header),
            Some(Fill::Flagged) => Some(&self.flagged),
            None => None,
        }
    }
}

fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: Option<&Format>,
) -> std::result::Result<(), XlsxError> {
    match (value, format) {
        (Value::Number(n), Some(f)) => ws.write_number_with_format(row, col, *n, f).map(|_| ()),
        (Value::Number(n), None) => ws.write_number(row, col, *n).map(|_| ()),
        (Value::Text(s), Some(f)) => ws.write_string_with_format(row, col, s, f).map(|_| ()),
        (Value::Text(s), None) => ws.write_string(row, col, s).map(|_| ()),
        (Value::Missing, Some(f)) => ws.write_blank(row, col, f).map(|_| ()),
        (Value::Missing, None) => Ok(()),
    }
}

fn write_sheet(workbook: &mut Workbook, sheet: &StyledSheet, formats: &Formats) -> std::result::Result<(), XlsxError> {
    let ws = workbook.add_worksheet();
    ws.set_name(&sheet.name)?;

    let header_format = formats.for_fill(sheet.header_fill);
    for (col, name) in sheet.header.iter().enumerate() {
        write_cell(ws, 0, col as u16, &Value::text(name.clone()), header_format)?;
    }

    for (r, row) in sheet.rows.iter().enumerate() {
        for (col, StyledCell { value, fill }) in row.iter().enumerate() {
            write_cell(ws, r as u32 + 1, col as u16, value, formats.for_fill(*fill))?;
        }
    }

    for note in &sheet.annotations {
        write_cell(ws, note.row, note.col, &note.value, formats.for_fill(note.fill))?;
    }

    ws.autofit();
    Ok(())
}

/// Reads rosters and renders styled workbooks as .xlsx
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxCodec;

impl WorkbookSink for XlsxCodec {
    fn extension(&self) -> &str {
        ".xlsx"
    }

    fn mime_type(&self) -> &str {
        XLSX_MIME_TYPE
    }

    fn render(&self, styled: &StyledWorkbook) -> Result<Vec<u8>> {
        let formats = Formats::new();
        let mut workbook = Workbook::new();
        for sheet in &styled.sheets {
            write_sheet(&mut workbook, sheet, &formats).map_err(xlsx_error)?;
        }
        workbook.save_to_buffer().map_err(xlsx_error)
    }
}

impl WorkbookSource for XlsxCodec {
    /// First worksheet, padded so row and column 0 are A1
    fn read_rows(&self, bytes: &[u8]) -> Result<Vec<Vec<Value>>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| Error::workbook(format!("Unreadable workbook: {}", e)))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|e| Error::workbook(format!("Unreadable sheet: {}", e)))?,
            None => return Ok(Vec::new()),
        };

        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<Value>> = (0..first_row).map(|_| Vec::new()).collect();
        for row in range.rows() {
            let mut cells = vec![Value::Missing; first_col as usize];
            cells.extend(row.iter().map(cell_value));
            rows.push(cells);
        }
        Ok(rows)
    }
}
