//! Raw form responses as returned by the form service

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// One answered question in a response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawField {
    pub number: u32,
    pub label: Option<String>,
    /// `None` when the response omitted the value key entirely
    pub value: Option<JsonValue>,
}

impl RawField {
    /// Parse a field entry, tolerating numbers sent as strings.
    /// Entries without a usable field number are skipped.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let obj = value.as_object()?;
        let number = match obj.get("number")? {
            JsonValue::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok())?,
            JsonValue::String(s) => s.trim().parse::<u32>().ok()?,
            _ => return None,
        };
        let label = obj
            .get("label")
            .and_then(|l| l.as_str())
            .map(|s| s.to_string());
        Some(Self {
            number,
            label,
            value: obj.get("value").cloned(),
        })
    }
}

/// One submitted form response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRecord {
    /// `None` when the response carried no field list
    pub fields: Option<Vec<RawField>>,
    pub metadata: Map<String, JsonValue>,
}

impl RawRecord {
    pub fn from_json(value: &JsonValue) -> Self {
        let mut metadata = value.as_object().cloned().unwrap_or_default();
        let fields = metadata
            .remove("fields")
            .and_then(|f| f.as_array().map(|items| items.iter().filter_map(RawField::from_json).collect()));
        Self { fields, metadata }
    }

    pub fn id(&self) -> Option<String> {
        match self.metadata.get("id")? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Field number to label, for one payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMapping {
    labels: BTreeMap<u32, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, number: u32, label: impl Into<String>) {
        self.labels.insert(number, label.into());
    }

    pub fn label(&self, number: u32) -> Option<&str> {
        self.labels.get(&number).map(|s| s.as_str())
    }

    pub fn contains(&self, number: u32) -> bool {
        self.labels.contains_key(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.labels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_record_from_json() {
        let record = RawRecord::from_json(&json!({
            "id": 991,
            "status": "pending",
            "fields": [
                {"number": 4, "label": "Employee ID", "value": "F0012"},
                {"number": "3", "label": "First Name", "value": null},
                {"number": 2, "label": "Last Name"},
                {"label": "no number", "value": "x"}
            ]
        }));

        let fields = record.fields.as_ref().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].number, 3);
        assert_eq!(fields[1].value, Some(JsonValue::Null));
        assert_eq!(fields[2].value, None);
        assert_eq!(record.id().as_deref(), Some("991"));
        assert!(!record.metadata.contains_key("fields"));
    }

    #[test]
    fn test_raw_record_without_field_list() {
        assert!(RawRecord::from_json(&json!({"id": "a"})).fields.is_none());
        assert!(RawRecord::from_json(&json!({"fields": "oops"})).fields.is_none());
        assert!(RawRecord::from_json(&json!("scalar")).fields.is_none());
    }
}
