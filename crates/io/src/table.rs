// Header + rows view of a CSV file or a single worksheet

/// A rectangular-ish table of text cells. Rows may be shorter than the header;
/// missing trailing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header equal to `name` (surrounding whitespace ignored).
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Cell text, or `""` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Cell text by header name, `None` when the column does not exist.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        self.column(name).map(|col| self.cell(row, col))
    }

    /// Overwrite one cell, widening the row if needed.
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= col {
                r.resize(col + 1, String::new());
            }
            r[col] = value.into();
        }
    }

    /// Column index for `name`, appending an empty column when missing.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        self.headers.len() - 1
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Project onto the named columns that exist, in the given order.
    pub fn select(&self, columns: &[&str]) -> Table {
        let picked: Vec<(String, usize)> = columns
            .iter()
            .filter_map(|name| self.column(name).map(|idx| (name.to_string(), idx)))
            .collect();
        let mut out = Table::new(picked.iter().map(|(name, _)| name.clone()).collect());
        for row in 0..self.rows.len() {
            out.push_row(picked.iter().map(|(_, idx)| self.cell(row, *idx).to_string()).collect());
        }
        out
    }

    /// Stack tables on top of each other, aligning columns by header name.
    /// The header set is the union in first-seen order; absent cells are empty.
    pub fn union(tables: impl IntoIterator<Item = Table>) -> Table {
        let mut out = Table::default();
        for table in tables {
            let mapping: Vec<usize> = table
                .headers
                .iter()
                .map(|h| out.ensure_column(h.trim()))
                .collect();
            for row in table.rows {
                let mut aligned = vec![String::new(); out.headers.len()];
                for (src, value) in row.into_iter().enumerate() {
                    if let Some(&dst) = mapping.get(src) {
                        aligned[dst] = value;
                    }
                }
                out.rows.push(aligned);
            }
        }
        let width = out.headers.len();
        for row in &mut out.rows {
            row.resize(width, String::new());
        }
        out
    }
}
