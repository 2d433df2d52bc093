//! Order codes: `#YYMMDD` followed by a per-day sequence, zero padded to three
//! digits. The sequence widens past 999 instead of wrapping.

use chrono::NaiveDate;

pub const PREFIX: char = '#';

pub fn date_prefix(date: NaiveDate) -> String {
    format!("{PREFIX}{}", date.format("%y%m%d"))
}

pub fn format_code(date: NaiveDate, sequence: u32) -> String {
    format!("{}{:03}", date_prefix(date), sequence)
}

/// True for codes of the canonical `#` + nine digits shape.
pub fn is_canonical(code: &str) -> bool {
    code.strip_prefix(PREFIX)
        .is_some_and(|digits| digits.len() == 9 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Code for the `index`th (1-based) order fanned out from one import row.
pub fn variant_code(base: &str, index: usize) -> String {
    format!("{}{index}", variant_prefix(base))
}

pub fn variant_prefix(base: &str) -> String {
    format!("{base}-V")
}

/// Import values that look like an order identifier rather than customer data.
pub fn looks_like_order_code(value: &str) -> bool {
    let value = value.trim();
    let upper = value.to_ascii_uppercase();
    if upper.starts_with("SKU-") || upper.starts_with("ORD-") {
        return true;
    }
    value
        .strip_prefix(PREFIX)
        .is_some_and(|rest| rest.len() >= 6 && rest.bytes().take(6).all(|b| b.is_ascii_digit()))
}
