//! Row expander - reconciled records to payment-ledger rows
//!
//! Each record yields one ledger row per distinct account code. Amounts are
//! summed per code; when only one code is present it takes the record's
//! total reimbursement. Records with no usable code still produce exactly
//! one row so nothing silently disappears from the upload.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::PaymentSettings;
use crate::domain::{LedgerRow, Outcome, ReconciledRecord};
use crate::services::dates;

fn account_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{3}-\d{4}-\d-\d{4}-\d{4}-\d{4}-\d{3}-\d{4}-\d{4}$")
            .expect("account code pattern is valid")
    })
}

/// Normalize an account code, `None` when it is not acceptable.
///
/// Codes without any digit (vendor or program names) pass through trimmed.
/// Otherwise `.` becomes `-`, everything but digits and dashes is removed,
/// and the result must match the nine-group layout.
pub fn normalize_account_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    let cleaned: String = trimmed
        .replace('.', "-")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if account_pattern().is_match(&cleaned) {
        Some(cleaned)
    } else {
        None
    }
}

pub fn is_valid_account_code(raw: &str) -> bool {
    normalize_account_code(raw).is_some()
}

/// Per pair: the total is numeric but the code is not acceptable
pub fn account_highlights(record: &ReconciledRecord) -> [bool; 3] {
    record.accounts.clone().map(|split| {
        split.total.parse_number().is_some() && !is_valid_account_code(&split.code.as_text())
    })
}

/// Whether any account pair of the record needs review
pub fn needs_review(record: &ReconciledRecord) -> bool {
    account_highlights(record).iter().any(|flag| *flag)
}

/// Invoice number if present, else the invoice date's `MON YYYY`
pub fn invoice_base(record: &ReconciledRecord) -> String {
    let number = record.invoice_number.trim();
    if !number.is_empty() {
        return number.to_string();
    }
    record
        .invoice_date
        .trimmed()
        .and_then(|text| dates::parse_flexible(&text))
        .map(dates::month_year)
        .unwrap_or_default()
}

/// Whole cents, `None` when the amount is too large to scale
fn cents(amount: Decimal) -> Option<String> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i128()
        .map(|c| c.to_string())
}

/// `"{base} {cents}"`, or just the base when the cents cannot be computed.
/// The flag is true in the latter case.
fn invoice_number(base: &str, amount: Decimal) -> (String, bool) {
    if base.is_empty() {
        return (String::new(), false);
    }
    match cents(amount) {
        Some(c) => (format!("{} {}", base, c), false),
        None => (base.to_string(), true),
    }
}

/// Code used for a pair: normalized when acceptable, else the raw text
fn resolved_code(raw: &str) -> String {
    normalize_account_code(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// One distinct account code of a record
struct Bucket {
    code: String,
    amount: Decimal,
    /// Some amount for this code could not be added without overflowing
    overflowed: bool,
}

/// Distinct codes with summed amounts, in first-seen order.
/// A pair only counts when its code is non-blank and its total numeric.
fn code_buckets(record: &ReconciledRecord) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();
    for split in &record.accounts {
        let code = resolved_code(&split.code.as_text());
        let Some(amount) = split.total.parse_decimal() else {
            continue;
        };
        if code.is_empty() {
            continue;
        }
        match buckets.iter_mut().find(|b| b.code == code) {
            Some(bucket) => match bucket.amount.checked_add(amount) {
                Some(sum) => bucket.amount = sum,
                None => bucket.overflowed = true,
            },
            None => buckets.push(Bucket {
                code,
                amount,
                overflowed: false,
            }),
        }
    }
    buckets
}

/// What went wrong while expanding one record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordIssues {
    /// The invoice date was present but unreadable
    pub bad_date: bool,
    /// An amount was too large to sum or convert to cents
    pub unusable_amount: bool,
}

/// Expand one record into its ledger rows.
///
/// Rows whose amount overflowed are flagged for review and reported in the
/// returned issues rather than aborting the run.
pub fn expand_record(record: &ReconciledRecord, payment: &PaymentSettings) -> (Vec<LedgerRow>, RecordIssues) {
    let base = invoice_base(record);
    let total = record.total_reimbursement.parse_decimal().unwrap_or(Decimal::ZERO);
    let mut issues = RecordIssues::default();

    let mut buckets = code_buckets(record);
    if buckets.len() == 1 && total > Decimal::ZERO {
        buckets[0].amount = total;
        buckets[0].overflowed = false;
    }

    let parsed_date = record
        .invoice_date
        .trimmed()
        .map(|text| dates::parse_flexible(&text));
    issues.bad_date = matches!(parsed_date, Some(None));
    let compact_date = parsed_date.flatten().map(dates::compact).unwrap_or_default();

    let payee = format!("{} {}", record.first.as_text(), record.last.as_text())
        .trim()
        .to_string();
    let mut row = |account: String, amount: Decimal, highlight: bool| {
        let (invoice, unscaled) = invoice_number(&base, amount);
        if unscaled {
            issues.unusable_amount = true;
        }
        LedgerRow {
            org_id: payment.org_id.clone(),
            bank: payment.bank.clone(),
            invoice_date: compact_date.clone(),
            amount,
            account,
            invoice_number: invoice,
            comment: payment.comment.clone(),
            payee_name: payee.clone(),
            payment_type: payment.payment_type.clone(),
            employee_id: record.employee_id.to_value(),
            match_status: record.match_status,
            highlight: highlight || unscaled,
        }
    };

    let overflowed = buckets.iter().any(|b| b.overflowed);
    let rows = if !buckets.is_empty() {
        buckets
            .into_iter()
            .map(|bucket| {
                let highlight = bucket.overflowed || !is_valid_account_code(&bucket.code);
                row(bucket.code, bucket.amount, highlight)
            })
            .collect()
    } else if total > Decimal::ZERO {
        vec![row(String::new(), total, true)]
    } else {
        let fallback = record
            .accounts
            .iter()
            .map(|split| resolved_code(&split.code.as_text()))
            .find(|code| !code.is_empty())
            .unwrap_or_default();
        let highlight = !is_valid_account_code(&fallback);
        vec![row(fallback, Decimal::ZERO, highlight)]
    };

    issues.unusable_amount |= overflowed;
    (rows, issues)
}

/// Expand every record that carries a match status.
///
/// Degraded when some invoice dates could not be read (those rows keep an
/// empty ledger invoice date) or some amounts overflowed (those rows are
/// flagged for review).
pub fn expand(records: &[ReconciledRecord], payment: &PaymentSettings) -> Outcome<Vec<LedgerRow>> {
    let mut ledger = Vec::new();
    let mut bad_dates = 0usize;
    let mut bad_amounts = 0usize;
    for record in records.iter().filter(|r| r.match_status.is_some()) {
        let (rows, issues) = expand_record(record, payment);
        bad_dates += usize::from(issues.bad_date);
        bad_amounts += usize::from(issues.unusable_amount);
        ledger.extend(rows);
    }

    let mut reasons = Vec::new();
    if bad_dates > 0 {
        reasons.push(format!("{} record(s) had unreadable invoice dates", bad_dates));
    }
    if bad_amounts > 0 {
        reasons.push(format!("{} record(s) had amounts too large to total", bad_amounts));
    }
    if reasons.is_empty() {
        Outcome::clean(ledger)
    } else {
        Outcome::degraded(ledger, reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountSplit, Category, EmployeeId, MatchStatus, Value};
    use std::str::FromStr;

    const VALID: &str = "123-4567-8-9012-3456-7890-123-4567-8901";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn record(splits: &[(&str, &str)], total: &str) -> ReconciledRecord {
        let mut record = ReconciledRecord::new(Category::Expense);
        record.employee_id = EmployeeId::Valid(7);
        record.first = Value::text("Jane");
        record.last = Value::text("Doe");
        record.match_status = Some(MatchStatus::Matched);
        for (slot, (code, amount)) in splits.iter().enumerate() {
            record.accounts[slot] = AccountSplit::new(*code, *amount);
        }
        record.total_reimbursement = Value::text(total);
        record
    }

    #[test]
    fn test_account_code_validation() {
        assert!(is_valid_account_code(VALID));
        assert!(is_valid_account_code("ABC REIMB"));
        assert!(!is_valid_account_code("12-34"));
        assert!(!is_valid_account_code(""));
        assert!(!is_valid_account_code("   "));
        assert_eq!(
            normalize_account_code("123.4567.8.9012.3456.7890.123.4567.8901 "),
            Some(VALID.to_string())
        );
        assert_eq!(
            normalize_account_code("Acct# 123-4567-8-9012-3456-7890-123-4567-8901"),
            Some(VALID.to_string())
        );
    }

    #[test]
    fn test_highlight_needs_numeric_total() {
        let flagged = record(&[("12-34", "10")], "10");
        assert_eq!(account_highlights(&flagged), [true, false, false]);
        assert!(needs_review(&flagged));

        let no_total = record(&[("12-34", "")], "10");
        assert!(!needs_review(&no_total));

        let blank_code = record(&[("", "5")], "5");
        assert!(needs_review(&blank_code));
    }

    #[test]
    fn test_invoice_base() {
        let mut r = record(&[], "0");
        r.invoice_date = Value::text("05/01/2024");
        assert_eq!(invoice_base(&r), "MAY 2024");

        r.invoice_date = Value::text("5012024");
        assert_eq!(invoice_base(&r), "MAY 2024");

        r.invoice_number = "JAN-MAR 2024".to_string();
        assert_eq!(invoice_base(&r), "JAN-MAR 2024");

        let mut empty = record(&[], "0");
        empty.invoice_date = Value::text("someday");
        assert_eq!(invoice_base(&empty), "");
    }

    #[test]
    fn test_single_account_takes_total_reimbursement() {
        let (rows, _) = expand_record(&record(&[(VALID, "50.00")], "75.00"), &PaymentSettings::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec("75.00"));
        assert_eq!(rows[0].account, VALID);
        assert!(!rows[0].highlight);
    }

    #[test]
    fn test_duplicate_codes_collapse() {
        let other = "999-4567-8-9012-3456-7890-123-4567-8901";
        let r = record(&[(VALID, "10"), (other, "5"), ("123.4567.8.9012.3456.7890.123.4567.8901", "2.50")], "17.50");
        let (rows, _) = expand_record(&r, &PaymentSettings::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, VALID);
        assert_eq!(rows[0].amount, dec("12.50"));
        assert_eq!(rows[1].account, other);
        assert_eq!(rows[1].amount, dec("5"));
    }

    #[test]
    fn test_invalid_code_row_is_flagged() {
        let mut r = record(&[("12-34", "20"), ("ABC REIMB", "5")], "25");
        r.invoice_number = "MAR 2024".to_string();
        let (rows, _) = expand_record(&r, &PaymentSettings::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, "12-34");
        assert!(rows[0].highlight);
        assert_eq!(rows[0].invoice_number, "MAR 2024 2000");
        assert_eq!(rows[1].account, "ABC REIMB");
        assert!(!rows[1].highlight);
        assert_eq!(rows[1].invoice_number, "MAR 2024 500");
    }

    #[test]
    fn test_no_code_with_total_emits_blank_flagged_row() {
        let mut r = record(&[("", "30")], "30");
        r.invoice_number = "APR 2024".to_string();
        let (rows, _) = expand_record(&r, &PaymentSettings::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, "");
        assert_eq!(rows[0].amount, dec("30"));
        assert_eq!(rows[0].invoice_number, "APR 2024 3000");
        assert!(rows[0].highlight);
    }

    #[test]
    fn test_nothing_usable_emits_zero_row() {
        let mut r = record(&[("", ""), ("ABC", "n/a")], "");
        r.invoice_number = "APR 2024".to_string();
        let (rows, _) = expand_record(&r, &PaymentSettings::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, "ABC");
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert_eq!(rows[0].invoice_number, "APR 2024 0");
        assert!(!rows[0].highlight);

        let (blank, _) = expand_record(&record(&[], "0"), &PaymentSettings::default());
        assert_eq!(blank[0].account, "");
        assert_eq!(blank[0].invoice_number, "");
        assert!(blank[0].highlight);
    }

    #[test]
    fn test_payment_metadata_and_payee() {
        let mut r = record(&[(VALID, "10")], "10");
        r.last = Value::Missing;
        r.invoice_date = Value::text("11/09/2024");
        let payment = PaymentSettings::default();
        let (rows, issues) = expand_record(&r, &payment);

        assert_eq!(issues, RecordIssues::default());
        let row = &rows[0];
        assert_eq!(row.payee_name, "Jane");
        assert_eq!(row.org_id, "33");
        assert_eq!(row.bank, "COUNTY");
        assert_eq!(row.payment_type, "E");
        assert_eq!(row.comment, "REIMB EXPENSE");
        assert_eq!(row.invoice_date, "11092024");
        assert_eq!(row.employee_id, Value::Number(7.0));
        assert_eq!(row.invoice_number, "NOV 2024 1000");
    }

    #[test]
    fn test_expand_skips_unmatched_and_reports_bad_dates() {
        let mut unreviewed = record(&[(VALID, "10")], "10");
        unreviewed.match_status = None;
        let mut bad = record(&[(VALID, "10")], "10");
        bad.invoice_date = Value::text("whenever");

        let outcome = expand(&[unreviewed, bad], &PaymentSettings::default());
        assert!(outcome.is_degraded());
        let rows = outcome.into_value();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].invoice_date, "");
    }

    #[test]
    fn test_rounding_of_cents() {
        assert_eq!(cents(dec("100")).as_deref(), Some("10000"));
        assert_eq!(cents(dec("12.345")).as_deref(), Some("1235"));
        assert_eq!(cents(dec("0.1")).as_deref(), Some("10"));
        assert_eq!(cents(dec("19.99")).as_deref(), Some("1999"));
        assert_eq!(cents(Decimal::MAX), None);
    }

    #[test]
    fn test_reexpanding_a_ledger_row_is_stable() {
        let cases = vec![
            record(&[(VALID, "50"), ("12-34", "7.25")], "57.25"),
            record(&[(VALID, "50")], "75"),
            record(&[("", "30")], "30"),
            record(&[("123.4567.8.9012.3456.7890.123.4567.8901", "")], "0"),
            record(&[("12-34", "oops")], ""),
        ];
        let payment = PaymentSettings::default();

        for case in cases {
            let (rows, _) = expand_record(&case, &payment);
            for row in rows {
                let amount = row.amount.to_string();
                let singleton = record(&[(row.account.as_str(), amount.as_str())], &amount);
                let (again, _) = expand_record(&singleton, &payment);

                assert_eq!(again.len(), 1);
                assert_eq!(again[0].amount, row.amount);
                assert_eq!(again[0].account, row.account);
                assert_eq!(again[0].highlight, row.highlight);
            }
        }
    }

    #[test]
    fn test_amount_too_large_for_cents_is_flagged() {
        let mut r = record(&[(VALID, "79228162514264337593543950335")], "");
        r.invoice_number = "MAY 2024".to_string();
        let (rows, issues) = expand_record(&r, &PaymentSettings::default());

        assert!(issues.unusable_amount);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Decimal::MAX);
        assert_eq!(rows[0].invoice_number, "MAY 2024");
        assert!(rows[0].highlight);
    }

    #[test]
    fn test_bucket_sum_overflow_is_flagged() {
        let huge = "50000000000000000000000000000";
        let other = "999-4567-8-9012-3456-7890-123-4567-8901";
        let r = record(&[(VALID, huge), (VALID, huge), (other, "5")], "");
        let (rows, issues) = expand_record(&r, &PaymentSettings::default());

        assert!(issues.unusable_amount);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].account, VALID);
        assert_eq!(rows[0].amount, dec(huge));
        assert!(rows[0].highlight);
        assert_eq!(rows[1].account, other);
        assert!(!rows[1].highlight);
    }

    #[test]
    fn test_comma_amounts_at_scale() {
        let mut r = record(&[(VALID, "1,234,567.89"), (VALID, "10,000,000.11")], "");
        r.invoice_number = "JUN 2024".to_string();
        let (rows, issues) = expand_record(&r, &PaymentSettings::default());

        assert_eq!(issues, RecordIssues::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec("11234568.00"));
        assert_eq!(rows[0].invoice_number, "JUN 2024 1123456800");
        assert!(!rows[0].highlight);
    }

    #[test]
    fn test_expand_degrades_on_overflow_without_dropping_rows() {
        let mut huge = record(&[(VALID, "79228162514264337593543950335")], "");
        huge.invoice_number = "MAY 2024".to_string();
        let fine = record(&[(VALID, "10")], "10");

        let outcome = expand(&[huge, fine], &PaymentSettings::default());
        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("too large"));
        let rows = outcome.into_value();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].highlight);
        assert!(!rows[1].highlight);
    }
}
