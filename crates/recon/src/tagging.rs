//! Cleanup Tagger: annotates a lead list with every reason a row should be
//! removed, then keeps one row per phone number.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use listscrub_io::Table;

use crate::error::ScrubError;
use crate::phone::parse_timestamp;

pub const REASON_COLUMN: &str = "reason_for_removal";
const PHONE_COLUMN: &str = "phone_number";

/// Columns carried into the tagged export, when present.
const EXPORT_COLUMNS: [&str; 10] = [
    "phone_number",
    "contact_id",
    "carrier_type",
    "full_name",
    "first_name",
    "last_name",
    "target_county",
    "target_state",
    "phone_index",
    "time_zone",
];

const NOT_EMPTY_COLUMNS: [&str; 5] = [
    "contact_deal_id",
    "contact_deal_status",
    "contact_person_id",
    "phone_number_deal_id",
    "phone_number_deal_status",
];

const RECENT_DATE_COLUMNS: [&str; 2] = ["RVM - Last RVM Date", "Latest Text Marketing Date (Sent)"];

const RECENT_DAYS: i64 = 7;
const ROLLING_OUTBOUND: &str = "Rolling 30 Days Max Outbound Count";
const ROLLING_TEXT: &str = "Rolling 30 Days Text Marketing Count";
const ROLLING_LIMIT: f64 = 3.0;

pub fn tagged_output_name(input_name: &str) -> String {
    format!("(With Cleanup Tagging) {input_name}")
}

#[derive(Debug, Clone)]
pub struct TaggedList {
    pub table: Table,
    /// Rows carrying at least one reason.
    pub tagged: usize,
    /// Rows folded into another row with the same phone number.
    pub duplicates: usize,
}

fn upper_eq(table: &Table, row: usize, col: usize, expected: &str) -> bool {
    table.cell(row, col).trim().to_uppercase() == expected
}

fn number(table: &Table, row: usize, col: usize) -> Option<f64> {
    table.cell(row, col).trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Every removal reason that applies to `row`. A rule only runs when its
/// columns exist.
fn reasons_for(table: &Table, row: usize, today: NaiveDate) -> Vec<String> {
    let mut reasons = Vec::new();
    let col = |name: &str| table.column(name);

    if let Some(c) = col("in_pipedrive") {
        if upper_eq(table, row, c, "Y") {
            reasons.push("in_pipedrive is Y".to_string());
        }
    }
    if let Some(c) = col("rc_pd") {
        if upper_eq(table, row, c, "YES") {
            reasons.push("rc_pd is Yes".to_string());
        }
    }
    if let (Some(t), Some(ct)) = (col("type"), col("carrier_type")) {
        if upper_eq(table, row, t, "LANDLINE") && upper_eq(table, row, ct, "LANDLINE") {
            reasons.push("Both type & carrier_type are Landline".to_string());
        }
    }
    if let Some(c) = col("text_opt_in") {
        if upper_eq(table, row, c, "NO") {
            reasons.push("text_opt_in is No".to_string());
        }
    }
    for name in NOT_EMPTY_COLUMNS {
        if col(name).is_some_and(|c| !table.cell(row, c).trim().is_empty()) {
            reasons.push(format!("{name} Not Empty"));
        }
    }

    let earliest = today - Duration::days(RECENT_DAYS);
    for name in RECENT_DATE_COLUMNS {
        let recent = col(name)
            .and_then(|c| parse_timestamp(table.cell(row, c)))
            .map(|at| at.date())
            .is_some_and(|day| day >= earliest && day <= today);
        if recent {
            reasons.push(format!("{name} - last 7 days from tool run date"));
        }
    }

    if let (Some(o), Some(t)) = (col(ROLLING_OUTBOUND), col(ROLLING_TEXT)) {
        if let (Some(outbound), Some(text)) = (number(table, row, o), number(table, row, t)) {
            if outbound + text >= ROLLING_LIMIT {
                reasons.push(format!("{ROLLING_OUTBOUND} and {ROLLING_TEXT} - total >= 3"));
            }
        }
    }

    if col("Deal - ID").is_some_and(|c| !table.cell(row, c).trim().is_empty()) {
        reasons.push("Deal - ID Not Empty".to_string());
    }
    if col("Deal - Text Opt-in").is_some_and(|c| table.cell(row, c).to_uppercase().contains("NO")) {
        reasons.push("Deal - Text Opt-in is No".to_string());
    }
    reasons
}

/// Tag every row, then keep one row per phone number: the first row with the
/// most reasons, listed in the order phones first appear. Rows without a phone
/// number are dropped.
pub fn tag_removal_reasons(table: &Table, today: NaiveDate, source: &str) -> Result<TaggedList, ScrubError> {
    let phone_col = table.column(PHONE_COLUMN).ok_or_else(|| ScrubError::MissingColumn {
        source: source.to_string(),
        column: PHONE_COLUMN.into(),
    })?;

    // phone -> (row, reasons), in first-appearance order
    let mut best: Vec<(usize, Vec<String>)> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    let mut rows_with_phone = 0;
    for row in 0..table.len() {
        let phone = table.cell(row, phone_col).trim();
        if phone.is_empty() {
            continue;
        }
        rows_with_phone += 1;
        let reasons = reasons_for(table, row, today);
        match slot_of.get(phone) {
            Some(&idx) => {
                if reasons.len() > best[idx].1.len() {
                    best[idx] = (row, reasons);
                }
            }
            None => {
                slot_of.insert(phone.to_string(), best.len());
                best.push((row, reasons));
            }
        }
    }

    let keep: Vec<&str> = EXPORT_COLUMNS.into_iter().filter(|c| table.has_column(c)).collect();
    let mut headers: Vec<String> = keep.iter().map(|c| c.to_string()).collect();
    headers.push(REASON_COLUMN.to_string());
    let mut out = Table::new(headers);
    let mut tagged = 0;
    for (row, reasons) in &best {
        if !reasons.is_empty() {
            tagged += 1;
        }
        let mut cells: Vec<String> = keep
            .iter()
            .map(|c| table.get(*row, c).unwrap_or_default().to_string())
            .collect();
        cells.push(reasons.join(", "));
        out.push_row(cells);
    }

    log::info!("{source}: {} rows kept, {tagged} tagged", out.len());
    Ok(TaggedList {
        table: out,
        tagged,
        duplicates: rows_with_phone - best.len(),
    })
}
