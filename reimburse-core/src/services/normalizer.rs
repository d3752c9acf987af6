//! Record normalizer - raw responses to category records
//!
//! Steps, in order: keep mapped fields per response, derive the invoice
//! identifier, concatenate split account codes (conference), then rename
//! fields onto semantic columns. Old and new schema payloads go through the
//! same steps with different [`CategorySchema`] tables.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{CategorySchema, InvoiceSource};
use crate::domain::columns::ACCOUNT_CODES;
use crate::domain::{CategoryRecord, FieldMapping, Outcome, RawRecord, Value, NOT_AVAILABLE};
use crate::ports::RunObserver;
use crate::services::{dates, field_mapper};

/// One response with only mapped fields, keyed by field number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormRow {
    pub values: BTreeMap<u32, Value>,
    pub invoice_number: String,
    /// Concatenated account codes, set by [`combine_account_codes`]
    pub account_codes: Option<[String; 3]>,
}

/// Mapped responses for one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormTable {
    pub mapping: FieldMapping,
    pub rows: Vec<FormRow>,
}

impl FormTable {
    fn drop_fields(&mut self, numbers: &[u32]) {
        for row in &mut self.rows {
            for number in numbers {
                row.values.remove(number);
            }
        }
    }
}

/// Keep every mapped field of every response.
///
/// A field with no value key becomes the "N/A" marker; an explicit null
/// stays missing. Responses with no mapped field produce no row.
pub fn normalize(records: &[RawRecord], mapping: &FieldMapping) -> FormTable {
    let rows = records
        .iter()
        .filter_map(|record| {
            let fields = record.fields.as_ref()?;
            let values: BTreeMap<u32, Value> = fields
                .iter()
                .filter(|f| mapping.contains(f.number))
                .map(|f| {
                    let value = match &f.value {
                        Some(v) => Value::from_json(v),
                        None => Value::text(NOT_AVAILABLE),
                    };
                    (f.number, value)
                })
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(FormRow {
                    values,
                    ..Default::default()
                })
            }
        })
        .collect();

    FormTable {
        mapping: mapping.clone(),
        rows,
    }
}

/// `"march 2024 travel"` becomes `"MARCH 2024"`; fewer than two tokens
/// yields nothing.
pub fn invoice_from_free_text(text: &str) -> String {
    let mut tokens = text.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(month), Some(year)) => format!("{} {}", month.to_uppercase(), year),
        _ => String::new(),
    }
}

/// Derive each row's invoice number and drop the source fields.
///
/// Old schemas read a free-text field, new schemas span a set of date
/// fields. Unparsable dates are skipped; the outcome is degraded when a
/// row had date answers but none of them parsed.
pub fn derive_invoice_number(table: &mut FormTable, schema: &CategorySchema) -> Outcome<()> {
    let mut unparsable_rows = 0usize;

    match &schema.invoice_source {
        InvoiceSource::FreeText(number) => {
            let present = table.mapping.contains(*number);
            for row in &mut table.rows {
                row.invoice_number = if present {
                    row.values
                        .get(number)
                        .map(|v| invoice_from_free_text(&v.as_text()))
                        .unwrap_or_default()
                } else {
                    String::new()
                };
            }
        }
        InvoiceSource::DateFields(numbers) => {
            let mapped: Vec<u32> = numbers
                .iter()
                .copied()
                .filter(|n| table.mapping.contains(*n))
                .collect();
            for row in &mut table.rows {
                let answers: Vec<String> = mapped
                    .iter()
                    .filter_map(|n| row.values.get(n))
                    .filter_map(|v| v.trimmed())
                    .filter(|s| s != NOT_AVAILABLE)
                    .collect();
                let parsed: Vec<_> = answers
                    .iter()
                    .filter_map(|s| dates::parse_month_first(s))
                    .collect();
                if parsed.is_empty() && !answers.is_empty() {
                    unparsable_rows += 1;
                }
                row.invoice_number = dates::invoice_period(&parsed);
            }
        }
    }

    table.drop_fields(&schema.invoice_source.field_numbers());

    if unparsable_rows > 0 {
        Outcome::degraded(
            (),
            format!(
                "{} {} response(s) had no parsable invoice dates",
                unparsable_rows,
                schema.category
            ),
        )
    } else {
        Outcome::clean(())
    }
}

/// Concatenate each group's non-empty answers with `-`.
///
/// Every row gets all three codes; a group with nothing filled in yields
/// an empty string. Source fields are dropped.
pub fn combine_account_codes(table: &mut FormTable, groups: &[Vec<u32>; 3]) {
    for row in &mut table.rows {
        let codes = groups.clone().map(|group| {
            group
                .iter()
                .filter_map(|n| row.values.get(n))
                .filter_map(|v| v.trimmed())
                .collect::<Vec<_>>()
                .join("-")
        });
        row.account_codes = Some(codes);
    }
    for group in groups {
        table.drop_fields(group);
    }
}

/// Rename mapped fields onto semantic columns.
///
/// Semantic columns whose field was not in the payload stay missing.
/// Leftover fields ride along as extras under their form labels.
pub fn into_records(table: &FormTable, schema: &CategorySchema) -> Vec<CategoryRecord> {
    let renamed: BTreeSet<u32> = schema.rename.iter().map(|(n, _)| *n).collect();

    table
        .rows
        .iter()
        .map(|row| {
            let mut record = CategoryRecord::new(schema.category);
            for (number, column) in &schema.rename {
                if let Some(value) = row.values.get(number) {
                    record.set(column, value.clone());
                }
            }
            if let Some(codes) = &row.account_codes {
                for (column, code) in ACCOUNT_CODES.iter().zip(codes) {
                    record.set(column, Value::text(code.clone()));
                }
            }
            record.invoice_number = row.invoice_number.clone();
            for (number, value) in &row.values {
                if renamed.contains(number) {
                    continue;
                }
                if let Some(label) = table.mapping.label(*number) {
                    record.extras.push((label.to_string(), value.clone()));
                }
            }
            record
        })
        .collect()
}

/// Run every normalization step for one payload
pub fn normalize_payload(
    records: &[RawRecord],
    schema: &CategorySchema,
    observer: &dyn RunObserver,
) -> Vec<CategoryRecord> {
    let mapping = field_mapper::build_mapping(records, &schema.target_fields);
    if mapping.is_empty() && !records.is_empty() {
        observer.anomaly(
            "normalize",
            &format!(
                "{} {} payload had no usable field list",
                schema.category,
                schema.version.as_str()
            ),
        );
    }

    let mut table = normalize(records, &mapping);
    derive_invoice_number(&mut table, schema).observe(observer, "normalize");
    if let Some(groups) = &schema.account_code_groups {
        combine_account_codes(&mut table, groups);
    }
    into_records(&table, schema)
}
