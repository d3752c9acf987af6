//! HR roster rows

use serde::Serialize;

use super::columns::ROSTER_COLUMNS;
use super::value::Value;

/// One employee as listed on the HR roster
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterRecord {
    pub org_id: Value,
    pub last: Value,
    pub first: Value,
    pub employee_id: Value,
    pub emp_status: Value,
    pub email: Value,
}

impl RosterRecord {
    /// Build from a spreadsheet row. Columns are positional: whatever the
    /// sheet calls them, the first six are read as the roster header.
    pub fn from_cells(cells: &[Value]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            org_id: cell(0),
            last: cell(1),
            first: cell(2),
            employee_id: cell(3),
            emp_status: cell(4),
            email: cell(5),
        }
    }

    /// Cells in roster header order
    pub fn cells(&self) -> Vec<Value> {
        vec![
            self.org_id.clone(),
            self.last.clone(),
            self.first.clone(),
            self.employee_id.clone(),
            self.emp_status.clone(),
            self.email.clone(),
        ]
    }

    pub fn header() -> Vec<String> {
        ROSTER_COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cells_is_positional() {
        let row = vec![
            Value::Number(33.0),
            Value::text("Doe"),
            Value::text("Jane"),
            Value::Number(7.0),
            Value::text("A"),
            Value::text("jdoe@example.org"),
            Value::text("ignored extra column"),
        ];
        let record = RosterRecord::from_cells(&row);
        assert_eq!(record.last, Value::text("Doe"));
        assert_eq!(record.employee_id, Value::Number(7.0));
        assert_eq!(record.cells().len(), ROSTER_COLUMNS.len());
    }

    #[test]
    fn test_short_row_fills_missing() {
        let record = RosterRecord::from_cells(&[Value::Number(33.0), Value::text("Doe")]);
        assert_eq!(record.first, Value::Missing);
        assert_eq!(record.email, Value::Missing);
    }
}
