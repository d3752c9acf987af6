//! Date parsing and the invoice-period formats built from dates

use chrono::{DateTime, Datelike, NaiveDate};

/// `MM/DD/YYYY`, the form service's date answer format
pub fn parse_month_first(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%m/%d/%Y").ok()
}

/// Best-effort date reading for invoice dates.
///
/// Accepts compact `MDDYYYY`/`MMDDYYYY` digits, slash dates (month first,
/// then day first), ISO dates and RFC 3339 timestamps.
pub fn parse_flexible(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        let expanded = match text.len() {
            7 => format!("0{}/{}/{}", &text[..1], &text[1..3], &text[3..]),
            8 => format!("{}/{}/{}", &text[..2], &text[2..4], &text[4..]),
            _ => return None,
        };
        return parse_slash_date(&expanded);
    }

    if let Some(date) = parse_slash_date(text) {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.date_naive())
}

fn parse_slash_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
}

/// Three-letter upper-case month name
pub fn month_abbrev(date: NaiveDate) -> String {
    date.format("%b").to_string().to_uppercase()
}

/// `MAY 2024`
pub fn month_year(date: NaiveDate) -> String {
    format!("{} {}", month_abbrev(date), date.year())
}

/// `MDDYYYY`: month without a leading zero, two-digit day
pub fn compact(date: NaiveDate) -> String {
    format!("{}{:02}{}", date.month(), date.day(), date.year())
}

/// Invoice period covering a set of dates.
///
/// Same month and year gives `MAR 2024`; otherwise `JAN-MAR 2024` with the
/// later year. A span across years that lands on the same month name
/// collapses to a single month.
pub fn invoice_period(dates: &[NaiveDate]) -> String {
    let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
        return String::new();
    };
    let (from, to) = (month_abbrev(*first), month_abbrev(*last));
    if from == to {
        format!("{} {}", from, last.year())
    } else {
        format!("{}-{} {}", from, to, last.year())
    }
}
