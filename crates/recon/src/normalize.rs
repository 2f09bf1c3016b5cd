//! Channel Normalizer: one implementation per channel kind, all behind the
//! [`Normalizer`] trait. Each turns a raw export table into canonical entries
//! and reports the inclusion policy it applied to outbound rows.

use chrono::NaiveDateTime;
use listscrub_io::{ReadOptions, Table};

use crate::config::WindowConfig;
use crate::error::ScrubError;
use crate::model::{ChannelKind, ChannelOutput, InclusionPolicy, RunClock, WindowReference};
use crate::phone::{canonical_number, country_coded_number, parse_timestamp, split_identifiers, DigitRule};

/// Per-invocation inputs that are not part of the table.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    pub clock: RunClock,
    /// Last-modified time of the export in storage (UTC).
    pub ingest_time: Option<NaiveDateTime>,
}

pub trait Normalizer {
    fn kind(&self) -> ChannelKind;

    /// How the export must be read (sheet name, header offset).
    fn read_options(&self) -> ReadOptions {
        ReadOptions::default()
    }

    /// Extract canonical entries. Pure: the registry is never touched here.
    fn normalize(&self, table: &Table, ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError>;
}

/// Dispatch a channel kind to its normalizer.
pub fn normalizer_for(kind: ChannelKind, windows: &WindowConfig) -> Box<dyn Normalizer> {
    match kind {
        ChannelKind::Jc => Box::new(JcNormalizer {
            window_days: windows.jc_sent,
        }),
        ChannelKind::Mvp => Box::new(MvpNormalizer),
        ChannelKind::PdDb => Box::new(PdDbNormalizer),
        ChannelKind::PdPhone => Box::new(PdPhoneNormalizer),
        ChannelKind::PdRemove => Box::new(PdRemoveNormalizer),
        ChannelKind::Sly => Box::new(SlyNormalizer),
        ChannelKind::ContactCenter => Box::new(ContactCenterNormalizer {
            window_days: windows.contact_center_outbound,
        }),
        ChannelKind::Rc => Box::new(RcNormalizer {
            window_days: windows.rc_outbound,
        }),
    }
}

fn require(table: &Table, kind: ChannelKind, column: &str) -> Result<usize, ScrubError> {
    table.column(column).ok_or_else(|| ScrubError::MissingColumn {
        source: kind.to_string(),
        column: column.into(),
    })
}

fn is(value: &str, expected: &str) -> bool {
    value.trim().eq_ignore_ascii_case(expected)
}

/// Normalize `raw` into `bucket`, counting non-empty values that fail.
fn push_number(
    raw: &str,
    rule: DigitRule,
    bucket: &mut std::collections::BTreeSet<String>,
    dropped: &mut usize,
) {
    if raw.trim().is_empty() {
        return;
    }
    match canonical_number(raw, rule) {
        Some(n) => {
            bucket.insert(n);
        }
        None => *dropped += 1,
    }
}

fn log_output(output: &ChannelOutput) {
    log::info!(
        "{}: {} unconditional, {} windowed",
        output.channel,
        output.unconditional.len(),
        output.windowed.len()
    );
    if output.dropped > 0 {
        log::debug!("{}: dropped {} malformed values", output.channel, output.dropped);
    }
}

// ---------------------------------------------------------------------------
// SMS gateways
// ---------------------------------------------------------------------------

/// JustCall: received messages always count; sent/delivered ones count while
/// the export itself is younger than the window (rows carry no timestamp).
pub struct JcNormalizer {
    pub window_days: u32,
}

impl Normalizer for JcNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Jc
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            sheet: Some("Messages Details".into()),
            header_row: 6,
        }
    }

    fn normalize(&self, table: &Table, ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let number_col = require(table, self.kind(), "Client Number")?;
        let status_col = require(table, self.kind(), "Delivery Status")?;
        let policy = InclusionPolicy::RollingWindow {
            days: self.window_days,
            reference: WindowReference::IngestTime,
        };
        let export_is_recent = policy.admits(ctx.ingest_time, ctx.clock.utc);

        let mut out = ChannelOutput::new(self.kind(), policy);
        for row in 0..table.len() {
            let status = table.cell(row, status_col);
            let raw = table.cell(row, number_col);
            if is(status, "received") {
                push_number(raw, DigitRule::STANDARD, &mut out.unconditional, &mut out.dropped);
            } else if (is(status, "sent") || is(status, "delivered")) && export_is_recent {
                push_number(raw, DigitRule::STANDARD, &mut out.windowed, &mut out.dropped);
            }
        }
        log_output(&out);
        Ok(out)
    }
}

/// MVP: inbound senders only, exported with their leading country-code digit.
pub struct MvpNormalizer;

impl Normalizer for MvpNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Mvp
    }

    fn normalize(&self, table: &Table, _ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let number_col = require(table, self.kind(), "Sender Number")?;
        let direction_col = require(table, self.kind(), "Direction")?;

        let mut out = ChannelOutput::new(self.kind(), InclusionPolicy::Unconditional);
        for row in 0..table.len() {
            let raw = table.cell(row, number_col);
            if !is(table.cell(row, direction_col), "inbound") || raw.trim().is_empty() {
                continue;
            }
            match country_coded_number(raw) {
                Some(n) => {
                    out.unconditional.insert(n);
                }
                None => out.dropped += 1,
            }
        }
        log_output(&out);
        Ok(out)
    }
}

/// RingCentral: inbound senders always; outbound recipients within the window
/// of their creation time.
pub struct RcNormalizer {
    pub window_days: u32,
}

impl Normalizer for RcNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Rc
    }

    fn normalize(&self, table: &Table, ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let time_col = require(table, self.kind(), "Creation Time (UTC)")?;
        let direction_col = require(table, self.kind(), "Direction")?;
        let from_col = require(table, self.kind(), "From")?;
        let to_col = require(table, self.kind(), "To")?;
        let policy = InclusionPolicy::RollingWindow {
            days: self.window_days,
            reference: WindowReference::Now,
        };

        let mut out = ChannelOutput::new(self.kind(), policy);
        for row in 0..table.len() {
            let direction = table.cell(row, direction_col);
            if is(direction, "inbound") {
                push_number(table.cell(row, from_col), DigitRule::STANDARD, &mut out.unconditional, &mut out.dropped);
            } else if is(direction, "outbound") {
                let created = parse_timestamp(table.cell(row, time_col));
                if policy.admits(created, ctx.clock.utc) {
                    push_number(table.cell(row, to_col), DigitRule::STANDARD, &mut out.windowed, &mut out.dropped);
                }
            }
        }
        log_output(&out);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Call center
// ---------------------------------------------------------------------------

/// Call-center logs: e-mail contacts ignored; inbound callers always, outbound
/// dialed numbers within the window of the call date (local time).
pub struct ContactCenterNormalizer {
    pub window_days: u32,
}

impl Normalizer for ContactCenterNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::ContactCenter
    }

    fn normalize(&self, table: &Table, ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let date_col = require(table, self.kind(), "Date")?;
        let direction_col = require(table, self.kind(), "Skill Direction")?;
        let from_col = require(table, self.kind(), "ANI/From")?;
        let to_col = require(table, self.kind(), "DNIS/To")?;
        let media_col = table.column("Media Type Name");
        let policy = InclusionPolicy::RollingWindow {
            days: self.window_days,
            reference: WindowReference::Now,
        };

        let mut out = ChannelOutput::new(self.kind(), policy);
        for row in 0..table.len() {
            if media_col.is_some_and(|c| is(table.cell(row, c), "e-mail")) {
                continue;
            }
            let direction = table.cell(row, direction_col);
            if is(direction, "inbound") {
                push_number(table.cell(row, from_col), DigitRule::STANDARD, &mut out.unconditional, &mut out.dropped);
            } else if is(direction, "outbound") {
                let called = parse_timestamp(table.cell(row, date_col));
                if policy.admits(called, ctx.clock.local) {
                    push_number(table.cell(row, to_col), DigitRule::STANDARD, &mut out.windowed, &mut out.dropped);
                }
            }
        }
        log_output(&out);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// CRM exports
// ---------------------------------------------------------------------------

/// Every comma-separated number in every present column of `columns`.
fn collect_phone_columns(
    table: &Table,
    kind: ChannelKind,
    columns: &[String],
) -> Result<ChannelOutput, ScrubError> {
    let present: Vec<usize> = columns.iter().filter_map(|c| table.column(c)).collect();
    if present.is_empty() {
        return Err(ScrubError::MissingColumn {
            source: kind.to_string(),
            column: columns.first().cloned().unwrap_or_default(),
        });
    }

    let mut out = ChannelOutput::new(kind, InclusionPolicy::Unconditional);
    for &col in &present {
        for row in 0..table.len() {
            for part in table.cell(row, col).split(',') {
                push_number(part, DigitRule::TEN_DIGIT, &mut out.unconditional, &mut out.dropped);
            }
        }
    }
    log_output(&out);
    Ok(out)
}

/// CRM person export, `Person - Phone 1` through `Person - Phone 10`.
pub struct PdPhoneNormalizer;

impl Normalizer for PdPhoneNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PdPhone
    }

    fn normalize(&self, table: &Table, _ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        require(table, self.kind(), "Person - Phone 1")?;
        let columns: Vec<String> = (1..=10).map(|i| format!("Person - Phone {i}")).collect();
        collect_phone_columns(table, self.kind(), &columns)
    }
}

/// CRM remove list: secondary and typed phone columns.
pub struct PdRemoveNormalizer;

impl Normalizer for PdRemoveNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PdRemove
    }

    fn normalize(&self, table: &Table, _ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let mut columns: Vec<String> = (2..=10).map(|i| format!("Person - Phone {i}")).collect();
        for typed in ["Work", "Home", "Mobile", "Other"] {
            columns.push(format!("Person - Phone - {typed}"));
        }
        collect_phone_columns(table, self.kind(), &columns)
    }
}

/// CRM deal export: the `|`-delimited unique database identifier field.
pub struct PdDbNormalizer;

impl Normalizer for PdDbNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PdDb
    }

    fn normalize(&self, table: &Table, _ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let id_col = require(table, self.kind(), "Deal - Unique Database ID")?;

        let mut out = ChannelOutput::new(self.kind(), InclusionPolicy::Unconditional);
        for row in 0..table.len() {
            let field = table.cell(row, id_col);
            let ids = split_identifiers(field);
            let non_blank = field.split('|').filter(|p| !p.trim().is_empty()).count();
            out.dropped += non_blank.saturating_sub(ids.len());
            out.unconditional.extend(ids);
        }
        log_output(&out);
        Ok(out)
    }
}

/// External do-not-call list: the first column. A header-less file's first
/// number lands in the header, so the header cell is tried too.
pub struct SlyNormalizer;

impl Normalizer for SlyNormalizer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sly
    }

    fn normalize(&self, table: &Table, _ctx: &NormalizeContext) -> Result<ChannelOutput, ScrubError> {
        let header = table.headers.first().ok_or_else(|| ScrubError::MissingColumn {
            source: self.kind().to_string(),
            column: "first column".into(),
        })?;

        let mut out = ChannelOutput::new(self.kind(), InclusionPolicy::Unconditional);
        if let Some(n) = canonical_number(header, DigitRule::STANDARD) {
            out.unconditional.insert(n);
        }
        for row in 0..table.len() {
            push_number(table.cell(row, 0), DigitRule::STANDARD, &mut out.unconditional, &mut out.dropped);
        }
        log_output(&out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn ctx(ingest: Option<NaiveDateTime>) -> NormalizeContext {
        NormalizeContext {
            clock: RunClock::fixed(now()),
            ingest_time: ingest,
        }
    }

    fn run(kind: ChannelKind, t: &Table, ingest: Option<NaiveDateTime>) -> ChannelOutput {
        normalizer_for(kind, &WindowConfig::default()).normalize(t, &ctx(ingest)).unwrap()
    }

    fn set(values: &[&str]) -> std::collections::BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn jc_received_unconditional_sent_by_ingest_age() {
        let t = table(
            &["Client Number", "Delivery Status"],
            &[
                &["15551110000", "Received"],
                &["15552220000", "Sent"],
                &["15553330000", "delivered"],
                &["15554440000", "Failed"],
                &["", "Received"],
            ],
        );
        let fresh = run(ChannelKind::Jc, &t, Some(now() - chrono::Duration::days(3)));
        assert_eq!(fresh.unconditional, set(&["5551110000"]));
        assert_eq!(fresh.windowed, set(&["5552220000", "5553330000"]));

        let stale = run(ChannelKind::Jc, &t, Some(now() - chrono::Duration::days(45)));
        assert_eq!(stale.unconditional, set(&["5551110000"]));
        assert!(stale.windowed.is_empty());
    }

    #[test]
    fn jc_reads_message_details_sheet() {
        let options = normalizer_for(ChannelKind::Jc, &WindowConfig::default()).read_options();
        assert_eq!(options.sheet.as_deref(), Some("Messages Details"));
        assert_eq!(options.header_row, 6);
    }

    #[test]
    fn mvp_inbound_country_coded_only() {
        let t = table(
            &["Sender Number", "Direction"],
            &[
                &["15551234567", "Inbound"],
                &["15559999999", "Outbound"],
                &["447911123456", "Inbound"],
                &["15551234567.0", "Inbound"],
                &["5552223333", "Inbound"],
            ],
        );
        let out = run(ChannelKind::Mvp, &t, None);
        assert_eq!(out.unconditional, set(&["5551234567"]));
        assert_eq!(out.dropped, 2);
    }

    #[test]
    fn rc_splits_by_direction_and_window() {
        let t = table(
            &["Creation Time (UTC)", "Direction", "From", "To"],
            &[
                &["2026-03-10T10:00:00Z", "Inbound", "+1 (555) 000-1111", "+1 (555) 999-0000"],
                &["2026-03-01T10:00:00Z", "Outbound", "+1 (555) 999-0000", "+1 (555) 000-2222"],
                &["2026-01-01T10:00:00Z", "Outbound", "+1 (555) 999-0000", "+1 (555) 000-3333"],
                &["not a date", "Outbound", "+1 (555) 999-0000", "+1 (555) 000-4444"],
            ],
        );
        let out = run(ChannelKind::Rc, &t, None);
        assert_eq!(out.unconditional, set(&["5550001111"]));
        assert_eq!(out.windowed, set(&["5550002222"]));
        assert_eq!(
            out.policy,
            InclusionPolicy::RollingWindow {
                days: 30,
                reference: WindowReference::Now
            }
        );
    }

    #[test]
    fn contact_center_skips_email_and_stale_outbound() {
        let t = table(
            &["Date", "Media Type Name", "Skill Direction", "ANI/From", "DNIS/To"],
            &[
                &["2026-03-14 08:00:00", "Call", "Inbound", "5550001111", "8005550000"],
                &["2026-03-14 08:00:00", "E-Mail", "Inbound", "5550009999", "8005550000"],
                &["2026-03-10 08:00:00", "Call", "Outbound", "8005550000", "5550002222"],
                &["2026-02-01 08:00:00", "Call", "Outbound", "8005550000", "5550003333"],
            ],
        );
        let out = run(ChannelKind::ContactCenter, &t, None);
        assert_eq!(out.unconditional, set(&["5550001111"]));
        assert_eq!(out.windowed, set(&["5550002222"]));
    }

    #[test]
    fn pd_phone_splits_multi_values() {
        let t = table(
            &["Deal - ID", "Person - Phone 1", "Person - Phone 2"],
            &[
                &["1", "5551112222.0", "5553334444, 5555556666"],
                &["2", "(555) 777-8888", "bad"],
            ],
        );
        let out = run(ChannelKind::PdPhone, &t, None);
        assert_eq!(
            out.unconditional,
            set(&["5551112222", "5553334444", "5555556666", "5557778888"])
        );
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn pd_phone_requires_first_phone_column() {
        let t = table(&["Person - Phone 2"], &[&["5551112222"]]);
        let err = normalizer_for(ChannelKind::PdPhone, &WindowConfig::default())
            .normalize(&t, &ctx(None))
            .unwrap_err();
        assert!(err.to_string().contains("Person - Phone 1"));
    }

    #[test]
    fn pd_remove_reads_typed_columns() {
        let t = table(
            &["Person - Phone - Mobile", "Person - Phone 3"],
            &[&["5551112222", ""], &["", "5553334444"]],
        );
        let out = run(ChannelKind::PdRemove, &t, None);
        assert_eq!(out.channel.primary_section(), crate::model::Section::CrmDuplicates);
        assert_eq!(out.unconditional, set(&["5551112222", "5553334444"]));
    }

    #[test]
    fn pd_db_identifiers() {
        let t = table(
            &["Deal - Unique Database ID"],
            &[&["101 | 102"], &["102|0103"], &["n/a"], &[""]],
        );
        let out = run(ChannelKind::PdDb, &t, None);
        assert_eq!(out.unconditional, set(&["101", "102", "103"]));
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn sly_uses_first_column_and_headerless_first_row() {
        let t = table(&["5550000001", "note"], &[&["(555) 000-0002", "x"], &["5550000002", "dup"]]);
        let out = run(ChannelKind::Sly, &t, None);
        assert_eq!(out.unconditional, set(&["5550000001", "5550000002"]));
    }

    #[test]
    fn missing_column_is_format_error() {
        let t = table(&["Direction"], &[]);
        let err = normalizer_for(ChannelKind::Mvp, &WindowConfig::default())
            .normalize(&t, &ctx(None))
            .unwrap_err();
        assert!(matches!(err, ScrubError::MissingColumn { ref column, .. } if column == "Sender Number"));
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let t = table(
            &["Creation Time (UTC)", "Direction", "From", "To"],
            &[
                &["2026-03-10T10:00:00Z", "Inbound", "15550001111", ""],
                &["2026-03-12T10:00:00Z", "Outbound", "", "15550002222"],
            ],
        );
        assert_eq!(run(ChannelKind::Rc, &t, None), run(ChannelKind::Rc, &t, None));
    }
}
