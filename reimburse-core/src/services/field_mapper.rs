//! Field mapper - resolves numeric form-field ids to labels
//!
//! Responses in one payload share a form schema, so the first record's
//! field list is enough. Only allow-listed field numbers survive.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use crate::domain::{FieldMapping, RawRecord};

/// Build the number-to-label mapping for one payload.
///
/// Returns an empty mapping when there are no records or the first one has
/// no field list. Numbers outside `target_fields` are dropped silently.
pub fn build_mapping(records: &[RawRecord], target_fields: &BTreeSet<u32>) -> FieldMapping {
    let mut mapping = FieldMapping::new();
    let Some(fields) = records.first().and_then(|r| r.fields.as_ref()) else {
        return mapping;
    };

    for field in fields {
        if !target_fields.contains(&field.number) {
            continue;
        }
        let label = field
            .label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| format!("Field {}", field.number));
        mapping.insert(field.number, label);
    }
    mapping
}

/// Same as [`build_mapping`] over an undecoded payload; anything other
/// than a JSON array yields an empty mapping.
pub fn build_mapping_from_json(payload: &JsonValue, target_fields: &BTreeSet<u32>) -> FieldMapping {
    match payload.as_array() {
        Some(items) => {
            let first: Vec<RawRecord> = items.iter().take(1).map(RawRecord::from_json).collect();
            build_mapping(&first, target_fields)
        }
        None => FieldMapping::new(),
    }
}
