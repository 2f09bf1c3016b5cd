//! Lookup Resolver: backfills missing deal identifiers on raw text and call
//! logs from a CRM phone export.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use listscrub_io::Table;

use crate::config::LookupConfig;
use crate::error::ScrubError;
use crate::phone::parse_slot;

const DEAL_ID: &str = "Deal ID";

/// Phone to joined deal identifiers, built from the CRM export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneIndex {
    map: BTreeMap<String, String>,
}

impl PhoneIndex {
    /// Explode every comma-separated phone of every row, keep digits only, and
    /// join the distinct identifiers seen for each phone in first-seen order.
    pub fn build(source: &Table, config: &LookupConfig) -> Result<Self, ScrubError> {
        let require = |column: &str| {
            source.column(column).ok_or_else(|| ScrubError::MissingColumn {
                source: "record source".into(),
                column: column.into(),
            })
        };
        let phone_col = require(&config.source_phone_column)?;
        let id_col = require(&config.source_id_column)?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in 0..source.len() {
            let id = source.cell(row, id_col).trim();
            if id.is_empty() {
                continue;
            }
            let mut phones: Vec<String> = Vec::new();
            for part in source.cell(row, phone_col).split(',') {
                let digits: String = part.chars().filter(char::is_ascii_digit).collect();
                if !digits.is_empty() && !phones.contains(&digits) {
                    phones.push(digits);
                }
            }
            for phone in phones {
                let ids = grouped.entry(phone).or_default();
                if !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }

        let map = grouped
            .into_iter()
            .map(|(phone, ids)| (phone, ids.join(&config.separator)))
            .collect();
        Ok(Self { map })
    }

    pub fn get(&self, phone: &str) -> Option<&str> {
        self.map.get(phone).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Which kind of log a file is, decided by its columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// SMS log keyed by `From`.
    Text,
    /// Call log keyed by `ANI`, carrying a `Resolve Date` column.
    Call,
}

/// Text logs key on `From`; everything else on `ANI`.
fn phone_column(table: &Table) -> &'static str {
    if table.has_column("From") {
        "From"
    } else {
        "ANI"
    }
}

impl LogKind {
    fn resolver_column(self) -> &'static str {
        match self {
            Self::Text => "Resolved By",
            Self::Call => "Resolved by",
        }
    }

    fn output_columns(self, phone: &'static str) -> Vec<&'static str> {
        match self {
            Self::Text => vec![phone, DEAL_ID, "Resolved By"],
            Self::Call => vec![phone, "Resolved by", "Resolve Date", DEAL_ID],
        }
    }
}

/// Strip the leading country digit the way each log stores it, then reduce to
/// an integer string. Unparsable values become empty.
fn format_log_phone(raw: &str, phone_column: &str) -> String {
    let raw = raw.trim();
    let stripped = if phone_column == "From" || raw.chars().count() == 11 {
        raw.chars().skip(1).collect::<String>()
    } else {
        raw.to_string()
    };
    parse_slot(&stripped).map(|n| n.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct ResolvedLog {
    pub kind: LogKind,
    /// The exported projection of the log.
    pub table: Table,
    pub resolved: usize,
}

impl ResolvedLog {
    /// Output file name for the `index`-th input (1-based).
    pub fn output_name(&self, index: usize) -> String {
        match self.kind {
            LogKind::Text => format!("{index}. Text Lookup.xlsx"),
            LogKind::Call => format!("{index}. Call Lookup.xlsx"),
        }
    }
}

/// Fill `Deal ID` on every row lacking one whose phone is in `index`, and
/// stamp the resolver (plus the date, for call logs).
pub fn resolve(
    log: &Table,
    index: &PhoneIndex,
    config: &LookupConfig,
    today: NaiveDate,
    source: &str,
) -> Result<ResolvedLog, ScrubError> {
    let kind = if log.has_column("Resolve Date") {
        LogKind::Call
    } else {
        LogKind::Text
    };
    let phone_name = phone_column(log);
    let phone_col = log.column(phone_name).ok_or_else(|| ScrubError::MissingColumn {
        source: source.to_string(),
        column: phone_name.into(),
    })?;

    let mut table = log.clone();
    let deal_col = table.ensure_column(DEAL_ID);
    let resolver_col = table.ensure_column(kind.resolver_column());
    let date_col = match kind {
        LogKind::Call => Some(table.ensure_column("Resolve Date")),
        LogKind::Text => None,
    };
    let stamp = today.format("%m/%d/%Y").to_string();

    let mut resolved = 0;
    for row in 0..table.len() {
        let phone = format_log_phone(table.cell(row, phone_col), phone_name);
        table.set_cell(row, phone_col, phone.clone());
        if !table.cell(row, deal_col).trim().is_empty() {
            continue;
        }
        let Some(ids) = index.get(&phone) else {
            continue;
        };
        table.set_cell(row, deal_col, ids.to_string());
        table.set_cell(row, resolver_col, config.resolver_name.clone());
        if let Some(col) = date_col {
            table.set_cell(row, col, stamp.clone());
        }
        resolved += 1;
    }

    log::info!("{source}: resolved {resolved} of {} rows", table.len());
    Ok(ResolvedLog {
        kind,
        table: table.select(&kind.output_columns(phone_name)),
        resolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        }
    }

    fn crm() -> Table {
        table(
            &["phone_number", "Deal - ID"],
            &[
                &["(555) 111-0000, 555-222-0000, (555) 111-0000", "101"],
                &["5551110000", "102"],
                &["5551110000", "101"],
                &["", "103"],
                &["5553330000", ""],
            ],
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    #[test]
    fn index_joins_distinct_ids_per_phone() {
        let index = PhoneIndex::build(&crm(), &LookupConfig::default()).unwrap();
        assert_eq!(index.get("5551110000"), Some("101 | 102"));
        assert_eq!(index.get("5552220000"), Some("101"));
        assert_eq!(index.get("5553330000"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn text_log_fills_missing_deal_ids() {
        let index = PhoneIndex::build(&crm(), &LookupConfig::default()).unwrap();
        let log = table(
            &["From", "Body", "Deal ID", "Resolved By"],
            &[
                &["15551110000", "hi", "", ""],
                &["15552220000", "hey", "999", "Agent"],
                &["15559990000", "yo", "", ""],
            ],
        );
        let out = resolve(&log, &index, &LookupConfig::default(), today(), "texts.csv").unwrap();
        assert_eq!(out.kind, LogKind::Text);
        assert_eq!(out.resolved, 1);
        assert_eq!(out.output_name(1), "1. Text Lookup.xlsx");
        assert_eq!(out.table.headers, ["From", "Deal ID", "Resolved By"]);
        assert_eq!(out.table.rows[0], ["5551110000", "101 | 102", "List Scrub Resolver"]);
        assert_eq!(out.table.rows[1], ["5552220000", "999", "Agent"]);
        assert_eq!(out.table.rows[2], ["5559990000", "", ""]);
    }

    #[test]
    fn call_log_stamps_resolve_date() {
        let index = PhoneIndex::build(&crm(), &LookupConfig::default()).unwrap();
        let log = table(
            &["ANI", "Deal ID", "Resolved by", "Resolve Date"],
            &[&["15552220000", "", "", ""], &["5551110000", "", "", ""]],
        );
        let out = resolve(&log, &index, &LookupConfig::default(), today(), "calls.xlsx").unwrap();
        assert_eq!(out.kind, LogKind::Call);
        assert_eq!(out.output_name(2), "2. Call Lookup.xlsx");
        assert_eq!(out.table.headers, ["ANI", "Resolved by", "Resolve Date", "Deal ID"]);
        assert_eq!(out.table.rows[0], ["5552220000", "List Scrub Resolver", "03/15/2026", "101"]);
        assert_eq!(out.table.rows[1][3], "101 | 102");
    }

    #[test]
    fn log_without_phone_column_fails() {
        let index = PhoneIndex::default();
        let log = table(&["Body"], &[&["x"]]);
        let err = resolve(&log, &index, &LookupConfig::default(), today(), "bad.csv").unwrap_err();
        assert!(matches!(err, ScrubError::MissingColumn { ref column, .. } if column == "ANI"));
    }
}
