// CSV import/export

use std::path::Path;

use crate::error::IoError;
use crate::table::Table;

/// Parse CSV bytes into a table. Rows above `header_row` are discarded.
pub fn read_bytes(bytes: &[u8], header_row: usize) -> Result<Table, IoError> {
    let content = decode_utf8(bytes.to_vec());
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);
    import_from_string(content, delimiter, header_row)
}

pub fn read(path: &Path) -> Result<Table, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::Read(format!("{}: {e}", path.display())))?;
    read_bytes(&bytes, 0)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Higher field count breaks ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Convert to UTF-8, falling back to Windows-1252 (common for Excel-exported CSVs).
pub fn decode_utf8(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("input is not UTF-8 ({} bytes), decoding as Windows-1252", bytes.len());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

fn import_from_string(content: &str, delimiter: u8, header_row: usize) -> Result<Table, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut table = Table::default();
    let mut saw_header = false;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| IoError::Read(e.to_string()))?;
        if row_idx < header_row {
            continue;
        }
        let cells: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        if !saw_header {
            table.headers = cells.into_iter().map(|h| h.trim().to_string()).collect();
            saw_header = true;
            continue;
        }
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        table.push_row(cells);
    }

    Ok(table)
}

pub fn write(table: &Table, path: &Path) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| IoError::Write(e.to_string()))?;
    writer
        .write_record(&table.headers)
        .map_err(|e| IoError::Write(e.to_string()))?;
    let width = table.headers.len();
    for row in &table.rows {
        let mut record: Vec<&str> = row.iter().map(|s| s.as_str()).collect();
        record.resize(width.max(record.len()), "");
        writer.write_record(&record).map_err(|e| IoError::Write(e.to_string()))?;
    }
    writer.flush().map_err(|e| IoError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "phone1,phone2,contact_id\n5551234567,,12\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_single_column_falls_back_to_comma() {
        let content = "Phone Number\n5551234567\n5559876543\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_header_row_offset() {
        let content = b"Report\nGenerated today\nClient Number,Delivery Status\n15551234567,Received\n";
        let table = read_bytes(content, 2).unwrap();
        assert_eq!(table.headers, vec!["Client Number", "Delivery Status"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "Delivery Status"), Some("Received"));
    }

    #[test]
    fn test_blank_rows_skipped_and_bom_stripped() {
        let content = "\u{feff}From,To\n15551234567,15557654321\n,\n\n";
        let table = read_bytes(content.as_bytes(), 0).unwrap();
        assert_eq!(table.headers[0], "From");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_windows_1252_fallback() {
        // "Jos\xe9" is not valid UTF-8
        let bytes = b"name,phone\nJos\xe9,5551234567\n";
        let table = read_bytes(bytes, 0).unwrap();
        assert_eq!(table.get(0, "name"), Some("Jos\u{e9}"));
    }

    #[test]
    fn test_csv_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.csv");

        let table = Table {
            headers: vec!["phone1".into(), "contact_id".into(), "note".into()],
            rows: vec![
                vec!["5551234567".into(), "0012".into(), "a, b".into()],
                vec!["".into(), "7".into()],
            ],
        };
        write(&table, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"a, b\""));

        let back = read(&path).unwrap();
        assert_eq!(back.headers, table.headers);
        assert_eq!(back.rows[0], table.rows[0]);
        assert_eq!(back.rows[1], vec!["", "7", ""]);
    }
}
