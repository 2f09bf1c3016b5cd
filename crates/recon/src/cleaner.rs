//! List Cleaner: strips duplicate phone slots from a candidate outreach list
//! and drops every record the registry or disposition history suppresses.

use std::collections::HashSet;

use listscrub_io::Table;
use serde::Serialize;

use crate::config::CleanerConfig;
use crate::disposition::DispositionSets;
use crate::error::ScrubError;
use crate::phone::{canonical_identifier, canonical_number, parse_slot, DigitRule};
use crate::registry::SuppressionRegistry;

/// One row of a candidate list. Cells other than the slots stay in the
/// owning [`CandidateList`] table, addressed by `row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub row: usize,
    /// Phone slots in priority order; `None` is an empty slot.
    pub slots: Vec<Option<u64>>,
    pub record_id: Option<String>,
    pub deal_id: Option<String>,
    pub contact_type: Option<String>,
}

impl CandidateRecord {
    pub fn numbers(&self) -> impl Iterator<Item = u64> + '_ {
        self.slots.iter().flatten().copied()
    }

    pub fn has_phone(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }
}

/// A candidate table plus its parsed records, in input order.
#[derive(Debug, Clone)]
pub struct CandidateList {
    pub table: Table,
    pub records: Vec<CandidateRecord>,
    slot_cols: Vec<usize>,
}

impl CandidateList {
    /// Parse records out of `table`. Every slot column must exist; the
    /// identifier and contact-type columns are optional.
    pub fn from_table(table: Table, config: &CleanerConfig, source: &str) -> Result<Self, ScrubError> {
        let slot_cols = config
            .slot_columns
            .iter()
            .map(|name| {
                table.column(name).ok_or_else(|| ScrubError::MissingColumn {
                    source: source.to_string(),
                    column: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let id_col = table.column(&config.record_id_column);
        let deal_col = table.column(&config.deal_id_column);
        let type_col = table.column(&config.contact_type_column);

        let optional = |row: usize, col: Option<usize>| -> Option<String> {
            let value = table.cell(row, col?).trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        let records = (0..table.len())
            .map(|row| CandidateRecord {
                row,
                slots: slot_cols.iter().map(|&c| parse_slot(table.cell(row, c))).collect(),
                record_id: optional(row, id_col),
                deal_id: optional(row, deal_col),
                contact_type: optional(row, type_col),
            })
            .collect();

        Ok(Self {
            table,
            records,
            slot_cols,
        })
    }

    /// The surviving rows with their original columns. Slot cells carry the
    /// cleaned values: integers as digits, cleared slots empty.
    pub fn into_table(self) -> Table {
        let mut out = Table::new(self.table.headers.clone());
        for record in &self.records {
            let mut row = self.table.rows.get(record.row).cloned().unwrap_or_default();
            row.resize(out.headers.len().max(row.len()), String::new());
            for (slot, &col) in record.slots.iter().zip(&self.slot_cols) {
                row[col] = slot.map(|n| n.to_string()).unwrap_or_default();
            }
            out.push_row(row);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Slot dedup
// ---------------------------------------------------------------------------

/// Clear duplicate slot values in place.
///
/// Records are ranked by their slot tuple, descending with empty slots last.
/// Per slot position, a value shared by several records survives only in the
/// last-ranked one. Within each record a value then survives only in its
/// lowest-numbered slot. Record order is untouched.
pub fn dedup_slots(records: &mut [CandidateRecord]) {
    let width = records.iter().map(|r| r.slots.len()).max().unwrap_or(0);
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[b].slots.cmp(&records[a].slots));

    for slot in 0..width {
        let mut seen: HashSet<u64> = HashSet::new();
        for &idx in order.iter().rev() {
            let Some(cell) = records[idx].slots.get_mut(slot) else {
                continue;
            };
            if let Some(value) = *cell {
                if !seen.insert(value) {
                    *cell = None;
                }
            }
        }
    }

    for record in records.iter_mut() {
        for slot in (1..record.slots.len()).rev() {
            if let Some(value) = record.slots[slot] {
                if record.slots[..slot].contains(&Some(value)) {
                    record.slots[slot] = None;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

/// Rows removed at each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub input: usize,
    pub organizations: usize,
    pub no_phone: usize,
    pub identifiers: usize,
    pub registry: usize,
    pub dispositions: usize,
    pub survivors: usize,
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub survivors: CandidateList,
    pub report: CleanReport,
}

/// Registry and disposition lookups use the canonical form of a slot, so an
/// 11-digit slot still matches its 10-digit registry entry. Slots are integers
/// and have lost any leading zero; padding to ten digits restores it.
fn match_key(number: u64) -> String {
    let digits = format!("{number:010}");
    canonical_number(&digits, DigitRule::STANDARD).unwrap_or(digits)
}

fn retain_counting(records: &mut Vec<CandidateRecord>, keep: impl FnMut(&CandidateRecord) -> bool) -> usize {
    let before = records.len();
    records.retain(keep);
    before - records.len()
}

pub fn clean(
    mut list: CandidateList,
    registry: &SuppressionRegistry,
    dispositions: &DispositionSets,
    config: &CleanerConfig,
) -> CleanOutcome {
    let mut report = CleanReport {
        input: list.records.len(),
        ..CleanReport::default()
    };
    let records = &mut list.records;

    report.organizations = retain_counting(records, |r| {
        !r.contact_type.as_deref().is_some_and(|t| {
            config
                .organization_types
                .iter()
                .any(|org| org.trim().eq_ignore_ascii_case(t.trim()))
        })
    });

    dedup_slots(records);
    report.no_phone = retain_counting(records, CandidateRecord::has_phone);

    report.identifiers = retain_counting(records, |r| {
        let listed = r
            .record_id
            .as_deref()
            .and_then(canonical_identifier)
            .is_some_and(|id| registry.contains_identifier(&id));
        !listed && r.deal_id.is_none()
    });

    report.registry = retain_counting(records, |r| {
        !r.numbers().any(|n| registry.contains_number(&match_key(n)))
    });

    report.dispositions = retain_counting(records, |r| {
        !r.numbers().any(|n| dispositions.contains(&match_key(n)))
    });

    report.survivors = records.len();
    log::info!(
        "Cleaned {} records: {} organizations, {} without phones, {} by identifier, {} by registry, {} by disposition, {} kept",
        report.input,
        report.organizations,
        report.no_phone,
        report.identifiers,
        report.registry,
        report.dispositions,
        report.survivors
    );

    CleanOutcome {
        survivors: list,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Section;
    use proptest::prelude::*;

    const A: u64 = 5551110000;
    const B: u64 = 5552220000;
    const C: u64 = 5553330000;

    fn record(row: usize, slots: [Option<u64>; 5]) -> CandidateRecord {
        CandidateRecord {
            row,
            slots: slots.to_vec(),
            record_id: None,
            deal_id: None,
            contact_type: None,
        }
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        }
    }

    const HEADERS: [&str; 8] = [
        "phone1", "phone2", "phone3", "phone4", "phone5", "contact_id", "contact_deal_id", "contact_type",
    ];

    fn list(rows: &[&[&str]]) -> CandidateList {
        CandidateList::from_table(table(&HEADERS, rows), &CleanerConfig::default(), "list.csv").unwrap()
    }

    fn run(list: CandidateList, registry: &SuppressionRegistry, dispositions: &DispositionSets) -> CleanOutcome {
        clean(list, registry, dispositions, &CleanerConfig::default())
    }

    #[test]
    fn repeated_number_keeps_highest_priority_slot() {
        let mut records = vec![record(0, [Some(A), Some(B), Some(A), None, None])];
        dedup_slots(&mut records);
        assert_eq!(records[0].slots, vec![Some(A), Some(B), None, None, None]);
    }

    #[test]
    fn same_slot_across_records_keeps_last_ranked() {
        // Ranked descending: row1 [B, ..] first, then row0 [A, C], then row2 [A, ..].
        let mut records = vec![
            record(0, [Some(A), Some(C), None, None, None]),
            record(1, [Some(B), Some(C), None, None, None]),
            record(2, [Some(A), None, None, None, None]),
        ];
        dedup_slots(&mut records);
        assert_eq!(records[0].slots[0], None);
        assert_eq!(records[2].slots[0], Some(A));
        assert_eq!(records[0].slots[1], Some(C));
        assert_eq!(records[1].slots[1], None);
        let rows: Vec<_> = records.iter().map(|r| r.row).collect();
        assert_eq!(rows, [0, 1, 2]);
    }

    #[test]
    fn registry_match_drops_record() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::General, "5551234567");
        let out = run(
            list(&[&["5551234567", "", "", "", "", "1", "", ""], &["5550000000", "", "", "", "", "2", "", ""]]),
            &registry,
            &DispositionSets::default(),
        );
        assert_eq!(out.report.registry, 1);
        let table = out.survivors.into_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "contact_id"), Some("2"));
    }

    #[test]
    fn eleven_digit_slot_matches_canonical_entry() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::Dnc, "5551234567");
        let out = run(list(&[&["15551234567", "", "", "", "", "", "", ""]]), &registry, &DispositionSets::default());
        assert_eq!(out.report.survivors, 0);
    }

    #[test]
    fn leading_zero_entry_matches_integer_slot() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::General, "0551234567");
        let mut dispositions = DispositionSets::default();
        dispositions.permanent.insert("0559876543".to_string());
        let out = run(
            list(&[
                &["0551234567", "", "", "", "", "1", "", ""],
                &["559876543", "", "", "", "", "2", "", ""],
                &["5550000000", "", "", "", "", "3", "", ""],
            ]),
            &registry,
            &dispositions,
        );
        assert_eq!(out.report.registry, 1);
        assert_eq!(out.report.dispositions, 1);
        assert_eq!(out.report.survivors, 1);
    }

    #[test]
    fn organizations_and_empty_rows_dropped() {
        let out = run(
            list(&[
                &["5550000001", "", "", "", "", "1", "", "Company"],
                &["n/a", "", "", "", "", "2", "", "person"],
                &["5550000003.0", "", "", "", "", "3", "", "person"],
            ]),
            &SuppressionRegistry::new(),
            &DispositionSets::default(),
        );
        assert_eq!(out.report.organizations, 1);
        assert_eq!(out.report.no_phone, 1);
        let table = out.survivors.into_table();
        assert_eq!(table.get(0, "phone1"), Some("5550000003"));
    }

    #[test]
    fn identifier_and_deal_suppression() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::UniqueId, "42");
        let out = run(
            list(&[
                &["5550000001", "", "", "", "", "0042", "", ""],
                &["5550000002", "", "", "", "", "7", "D-9", ""],
                &["5550000003", "", "", "", "", "8", " ", ""],
            ]),
            &registry,
            &DispositionSets::default(),
        );
        assert_eq!(out.report.identifiers, 2);
        assert_eq!(out.survivors.records[0].row, 2);
    }

    #[test]
    fn disposition_sets_suppress_any_slot() {
        let dispositions = DispositionSets {
            permanent: ["5550000002".to_string()].into(),
            windowed: ["5550000004".to_string()].into(),
        };
        let out = run(
            list(&[
                &["5550000001", "5550000002", "", "", "", "", "", ""],
                &["5550000003", "", "", "", "5550000004", "", "", ""],
                &["5550000005", "", "", "", "", "", "", ""],
            ]),
            &SuppressionRegistry::new(),
            &dispositions,
        );
        assert_eq!(out.report.dispositions, 2);
        assert_eq!(out.report.survivors, 1);
    }

    #[test]
    fn missing_slot_column_is_an_error() {
        let err = CandidateList::from_table(
            table(&["phone1", "phone2"], &[]),
            &CleanerConfig::default(),
            "short.csv",
        )
        .unwrap_err();
        assert!(matches!(err, ScrubError::MissingColumn { ref column, .. } if column == "phone3"));
    }

    fn slot_strategy() -> impl Strategy<Value = Option<u64>> {
        prop_oneof![Just(None), (0u64..6).prop_map(|n| Some(5550000000 + n))]
    }

    fn records_strategy() -> impl Strategy<Value = Vec<CandidateRecord>> {
        prop::collection::vec(prop::collection::vec(slot_strategy(), 5), 0..12).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(row, slots)| CandidateRecord {
                    row,
                    slots,
                    record_id: None,
                    deal_id: None,
                    contact_type: None,
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn dedup_leaves_no_shared_slot_values(mut records in records_strategy()) {
            dedup_slots(&mut records);
            for slot in 0..5 {
                let mut seen = HashSet::new();
                for r in &records {
                    if let Some(v) = r.slots[slot] {
                        prop_assert!(seen.insert(v), "value {} repeated in slot {}", v, slot + 1);
                    }
                }
            }
            for r in &records {
                let values: Vec<u64> = r.numbers().collect();
                let unique: HashSet<u64> = values.iter().copied().collect();
                prop_assert_eq!(values.len(), unique.len());
            }
        }

        #[test]
        fn adding_registry_entries_only_removes_rows(
            records in records_strategy(),
            extra in 0u64..6,
        ) {
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    let mut row: Vec<String> = r.slots.iter().map(|s| s.map(|n| n.to_string()).unwrap_or_default()).collect();
                    row.extend([r.row.to_string(), String::new(), String::new()]);
                    row
                })
                .collect();
            let source = Table {
                headers: HEADERS.iter().map(|s| s.to_string()).collect(),
                rows,
            };
            let config = CleanerConfig::default();
            let base = SuppressionRegistry::new();
            let mut larger = SuppressionRegistry::new();
            larger.insert(Section::RollingOutbound, (5550000000 + extra).to_string());

            let keep = |registry: &SuppressionRegistry| -> HashSet<usize> {
                let list = CandidateList::from_table(source.clone(), &config, "p.csv").unwrap();
                clean(list, registry, &DispositionSets::default(), &config)
                    .survivors
                    .records
                    .iter()
                    .map(|r| r.row)
                    .collect()
            };
            let before = keep(&base);
            let after = keep(&larger);
            prop_assert!(after.is_subset(&before));
        }
    }
}
