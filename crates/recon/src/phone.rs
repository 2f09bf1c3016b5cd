//! Digit, identifier, slot, and timestamp normalization shared by every stage.
//!
//! Nothing here fails loudly: a value that cannot be normalized yields `None`
//! and the caller drops it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Accepted digit count for a canonical number, checked after the 11-digit
/// country-code strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitRule {
    pub min_len: usize,
    pub max_len: usize,
}

impl DigitRule {
    /// Most channels: 10 to 15 digits.
    pub const STANDARD: DigitRule = DigitRule { min_len: 10, max_len: 15 };
    /// CRM phone exports: North American numbers only.
    pub const TEN_DIGIT: DigitRule = DigitRule { min_len: 10, max_len: 10 };
}

impl Default for DigitRule {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Formatting characters tolerated around the digits of a phone number.
fn is_phone_punctuation(c: char) -> bool {
    matches!(c, ' ' | '\t' | '(' | ')' | '-' | '.' | '+' | '/')
}

/// Strip a trailing `.0` left behind when a spreadsheet stored the value as a float.
fn strip_float_artifact(raw: &str) -> &str {
    raw.strip_suffix(".0").unwrap_or(raw)
}

/// Normalize a raw phone value to its canonical digit-only form.
///
/// An 11-digit value loses its leading country-code digit. Letters or other
/// unexpected characters make the value malformed.
pub fn canonical_number(raw: &str, rule: DigitRule) -> Option<String> {
    let trimmed = strip_float_artifact(raw.trim());
    if trimmed.is_empty() {
        return None;
    }

    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !is_phone_punctuation(c) {
            return None;
        }
    }

    if digits.len() == 11 {
        digits.remove(0);
    }

    if digits.len() < rule.min_len || digits.len() > rule.max_len {
        return None;
    }
    Some(digits)
}

/// A number that must arrive with its country-code digit: exactly 11 raw
/// digits, canonicalized to the remaining 10.
pub fn country_coded_number(raw: &str) -> Option<String> {
    let digits = strip_float_artifact(raw.trim()).bytes().filter(u8::is_ascii_digit).count();
    if digits != 11 {
        return None;
    }
    canonical_number(raw, DigitRule::TEN_DIGIT)
}

/// Canonical integer-string form of a record identifier (`"0042"` and `"42.0"` become `"42"`).
pub fn canonical_identifier(raw: &str) -> Option<String> {
    let trimmed = strip_float_artifact(raw.trim());
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<u64>().ok().map(|n| n.to_string())
}

/// Split a `|`-delimited multi-value identifier field, keeping first-seen order.
pub fn split_identifiers(field: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in field.split('|') {
        if let Some(id) = canonical_identifier(part) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

/// Coerce a candidate phone slot to an integer; anything unparsable is empty.
pub fn parse_slot(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<u64>() {
        return Some(n);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < 1e19 => Some(f as u64),
        _ => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d-%b-%Y"];

/// Parse the timestamp shapes seen in channel exports. Offsets are folded to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(" UTC").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%z") {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
