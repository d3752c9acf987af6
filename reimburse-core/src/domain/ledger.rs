//! Payment-upload rows

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use super::columns::{
    INVOICE_DATE, INVOICE_NUMBER, LEDGER_ACCOUNT, LEDGER_AMOUNT, LEDGER_BANK, LEDGER_COLUMNS,
    LEDGER_COMMENT, LEDGER_EMP_ID, LEDGER_ORG_ID, LEDGER_PAYMENT_TYPE, PAYEE_NAME,
};
use super::reconciled::MatchStatus;
use super::value::Value;

/// One payment line, scoped to a single account code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub org_id: String,
    pub bank: String,
    /// Compact `MDDYYYY` form of the submission's invoice date
    pub invoice_date: String,
    pub amount: Decimal,
    pub account: String,
    pub invoice_number: String,
    pub comment: String,
    pub payee_name: String,
    pub payment_type: String,
    pub employee_id: Value,
    pub match_status: Option<MatchStatus>,
    pub highlight: bool,
}

impl LedgerRow {
    pub fn cell(&self, column: &str) -> Value {
        let text = |s: &str| {
            if s.is_empty() {
                Value::Missing
            } else {
                Value::text(s)
            }
        };
        match column {
            LEDGER_ORG_ID => text(&self.org_id),
            LEDGER_BANK => text(&self.bank),
            INVOICE_DATE => text(&self.invoice_date),
            LEDGER_AMOUNT => self
                .amount
                .to_f64()
                .map(Value::Number)
                .unwrap_or_default(),
            LEDGER_ACCOUNT => text(&self.account),
            INVOICE_NUMBER => text(&self.invoice_number),
            LEDGER_COMMENT => text(&self.comment),
            PAYEE_NAME => text(&self.payee_name),
            LEDGER_PAYMENT_TYPE => text(&self.payment_type),
            LEDGER_EMP_ID => self.employee_id.clone(),
            _ => Value::Missing,
        }
    }

    /// Cells in payment-template order; unpopulated columns are empty
    pub fn row(&self) -> Vec<Value> {
        LEDGER_COLUMNS.iter().map(|c| self.cell(c)).collect()
    }
}
