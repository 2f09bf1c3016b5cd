//! Disposition suppression: numbers excluded because of prior call outcomes
//! recorded in an external relational store.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Months, NaiveDateTime};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::config::DispositionConfig;
use crate::error::ScrubError;
use crate::phone::{canonical_number, parse_timestamp, DigitRule};

/// The two fixed query shapes the cleaner needs from a disposition store.
pub trait DispositionSource {
    /// Every distinct number with at least one event carrying one of `codes`.
    fn distinct_numbers(&self, codes: &[String]) -> Result<Vec<String>, ScrubError>;

    /// For each number, its most recent event among `codes`.
    fn latest_events(&self, codes: &[String]) -> Result<Vec<(String, NaiveDateTime)>, ScrubError>;
}

/// Read-only view over a `call_dispositions(phone_number, disposition, called_at)` table.
pub struct SqliteDispositionSource {
    conn: Connection,
}

impl SqliteDispositionSource {
    pub fn open(path: &Path) -> Result<Self, ScrubError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an already-open session.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl DispositionSource for SqliteDispositionSource {
    fn distinct_numbers(&self, codes: &[String]) -> Result<Vec<String>, ScrubError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT phone_number FROM call_dispositions WHERE disposition IN ({})",
            placeholders(codes.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(codes.iter()), |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn latest_events(&self, codes: &[String]) -> Result<Vec<(String, NaiveDateTime)>, ScrubError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT phone_number, called_at FROM (
                SELECT phone_number, called_at,
                       ROW_NUMBER() OVER (PARTITION BY phone_number ORDER BY called_at DESC) AS rn
                FROM call_dispositions
                WHERE disposition IN ({})
             ) WHERE rn = 1",
            placeholders(codes.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(codes.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (number, called_at) = row?;
            match parse_timestamp(&called_at) {
                Some(at) => out.push((number, at)),
                None => log::debug!("Ignoring disposition for {number}: bad timestamp '{called_at}'"),
            }
        }
        Ok(out)
    }
}

/// Canonical numbers suppressed by disposition history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispositionSets {
    /// Numbers with any permanently suppressing code.
    pub permanent: BTreeSet<String>,
    /// Numbers whose latest windowed-code event is inside the trailing window.
    pub windowed: BTreeSet<String>,
}

impl DispositionSets {
    pub fn load(
        source: &dyn DispositionSource,
        config: &DispositionConfig,
        now: NaiveDateTime,
    ) -> Result<Self, ScrubError> {
        let permanent: BTreeSet<String> = source
            .distinct_numbers(&config.permanent_codes)?
            .iter()
            .filter_map(|n| canonical_number(n, DigitRule::STANDARD))
            .collect();

        let cutoff = now
            .checked_sub_months(Months::new(config.window_months))
            .unwrap_or(NaiveDateTime::MIN);
        let windowed: BTreeSet<String> = source
            .latest_events(&config.windowed_codes)?
            .into_iter()
            .filter(|(_, at)| *at >= cutoff)
            .filter_map(|(n, _)| canonical_number(&n, DigitRule::STANDARD))
            .collect();

        log::info!(
            "Disposition sets: {} permanent, {} within {} months",
            permanent.len(),
            windowed.len(),
            config.window_months
        );
        Ok(Self { permanent, windowed })
    }

    pub fn contains(&self, number: &str) -> bool {
        self.permanent.contains(number) || self.windowed.contains(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn source(rows: &[(&str, &str, &str)]) -> SqliteDispositionSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE call_dispositions (phone_number TEXT, disposition TEXT, called_at TEXT);",
        )
        .unwrap();
        for (phone, code, at) in rows {
            conn.execute(
                "INSERT INTO call_dispositions VALUES (?1, ?2, ?3)",
                rusqlite::params![phone, code, at],
            )
            .unwrap();
        }
        SqliteDispositionSource::from_connection(conn)
    }

    #[test]
    fn permanent_codes_have_no_time_bound() {
        let src = source(&[
            ("5550000001", "DNC", "2019-01-01 10:00:00"),
            ("5550000002", "VOICEMAIL", "2026-03-01 10:00:00"),
        ]);
        let sets = DispositionSets::load(&src, &DispositionConfig::default(), day(2026, 3, 15)).unwrap();
        assert_eq!(sets.permanent, BTreeSet::from(["5550000001".to_string()]));
        assert!(sets.windowed.is_empty());
    }

    #[test]
    fn seven_month_old_event_outside_six_month_window() {
        let src = source(&[
            ("5550000003", "NOT_INTERESTED", "2025-08-15 10:00:00"),
            ("5550000004", "NOT_INTERESTED", "2025-11-01 10:00:00"),
        ]);
        let sets = DispositionSets::load(&src, &DispositionConfig::default(), day(2026, 3, 15)).unwrap();
        assert!(!sets.contains("5550000003"));
        assert!(sets.contains("5550000004"));
    }

    #[test]
    fn only_latest_event_per_number_counts() {
        let src = source(&[
            ("5550000005", "NOT_INTERESTED", "2024-01-01 10:00:00"),
            ("5550000005", "NOT_INTERESTED", "2026-02-01 10:00:00"),
        ]);
        let latest = src.latest_events(&["NOT_INTERESTED".to_string()]).unwrap();
        assert_eq!(latest, vec![("5550000005".to_string(), day(2026, 2, 1) + chrono::Duration::hours(10))]);
    }

    #[test]
    fn empty_code_list_queries_nothing() {
        let src = source(&[("5550000001", "DNC", "2026-01-01")]);
        assert!(src.distinct_numbers(&[]).unwrap().is_empty());
    }
}
