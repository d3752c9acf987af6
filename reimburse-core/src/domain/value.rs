//! Cell values flowing from form responses and spreadsheets into the engine

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Marker written when a form field is present but carries no value key.
pub const NOT_AVAILABLE: &str = "N/A";

/// A loosely typed cell.
///
/// Form answers arrive as arbitrary JSON and roster cells as spreadsheet
/// data; both collapse into text or numbers. `Missing` means "no value",
/// which is distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Convert a JSON answer. Null is missing; booleans and nested values
    /// keep their JSON text.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Missing,
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => Value::Number(f),
                _ => Value::Text(n.to_string()),
            },
            JsonValue::Bool(b) => Value::Text(b.to_string()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Missing, or text that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(_) => false,
        }
    }

    /// Display text, empty for missing values
    pub fn as_text(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
        }
    }

    /// Trimmed display text, `None` when blank
    pub fn trimmed(&self) -> Option<String> {
        let text = self.as_text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Numeric reading with thousands separators removed.
    ///
    /// Returns `None` for blanks and anything that does not parse as a finite
    /// number, the "not numeric" case every amount rule keys on.
    pub fn parse_number(&self) -> Option<f64> {
        match self {
            Value::Missing => None,
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => {
                let cleaned = s.replace(',', "");
                let cleaned = cleaned.trim();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    /// Exact decimal reading used for money
    pub fn parse_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Missing => None,
            Value::Number(n) => Decimal::try_from(*n).ok(),
            Value::Text(s) => {
                let cleaned = s.replace(',', "");
                let cleaned = cleaned.trim();
                if cleaned.is_empty() {
                    return None;
                }
                Decimal::from_str(cleaned)
                    .or_else(|_| Decimal::from_scientific(cleaned))
                    .ok()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Missing => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// Integral floats print without a fraction so identifiers like `7.0`
/// read back as `7`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}
