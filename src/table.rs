// 📋 Persisted Tables - Keyed view over a grid of cells
//
// Stores hand out raw grids (rows of cells, header first). A KeyedTable is
// the ordered mapping key -> row built from one, and knows how to turn itself
// back into a grid for writing.

use crate::config::TableSpec;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Rows of cells; the first row (after the header offset) is the header
pub type Grid = Vec<Vec<String>>;

// ============================================================================
// ROW
// ============================================================================

/// Named fields of one row; a missing field reads as empty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }

    /// Trimmed value, `None` when blank
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        let value = self.get(column).trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn set(&mut self, column: &str, value: &str) {
        self.fields.insert(column.to_string(), value.to_string());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ============================================================================
// KEYED TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedTable {
    key_column: String,
    columns: Vec<String>,
    keys: Vec<String>,
    rows: HashMap<String, Row>,
}

impl KeyedTable {
    pub fn new(key_column: &str, columns: Vec<String>) -> Self {
        KeyedTable {
            key_column: key_column.to_string(),
            columns,
            keys: Vec::new(),
            rows: HashMap::new(),
        }
    }

    /// Build from a raw grid. Rows with a blank key are skipped; when a key
    /// repeats, the later row wins but keeps the first position.
    pub fn from_grid(grid: &Grid, spec: &TableSpec) -> SyncResult<Self> {
        let Some(header) = grid.get(spec.header_offset) else {
            return Ok(KeyedTable::new(&spec.key_column, Vec::new()));
        };

        let columns: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
        let Some(key_idx) = columns.iter().position(|c| *c == spec.key_column) else {
            if grid[spec.header_offset..].iter().all(|r| r.iter().all(|c| c.trim().is_empty())) {
                return Ok(KeyedTable::new(&spec.key_column, Vec::new()));
            }
            return Err(SyncError::Store(format!(
                "table {} has no '{}' column",
                spec.name, spec.key_column
            )));
        };

        let mut table = KeyedTable::new(&spec.key_column, Vec::new());
        table.columns = columns.iter().filter(|c| !c.is_empty()).cloned().collect();

        for cells in grid.iter().skip(spec.header_offset + 1) {
            let key = cells.get(key_idx).map(|k| k.trim()).unwrap_or("");
            if key.is_empty() {
                continue;
            }

            let mut row = Row::new();
            for (column, value) in columns.iter().zip(cells.iter()) {
                if !column.is_empty() {
                    row.set(column, value);
                }
            }

            if table.contains(key) {
                warn!(table = %spec.name, key, "duplicate key, keeping the later row");
            }
            table.insert(key, row);
        }

        Ok(table)
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Insert or overwrite; a new key goes to the end
    pub fn insert(&mut self, key: &str, mut row: Row) {
        row.set(&self.key_column, key);
        for column in row.columns() {
            if !self.columns.iter().any(|c| c == column) {
                self.columns.push(column.to_string());
            }
        }
        if self.rows.insert(key.to_string(), row).is_none() {
            self.keys.push(key.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        let removed = self.rows.remove(key);
        if removed.is_some() {
            self.keys.retain(|k| k != key);
        }
        removed
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &Row) -> bool,
    {
        let rows = &mut self.rows;
        self.keys.retain(|k| {
            let Some(row) = rows.get(k) else { return false };
            if keep(k, row) {
                true
            } else {
                rows.remove(k);
                false
            }
        });
    }

    /// Keys in table order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.keys
            .iter()
            .filter_map(|k| self.rows.get(k).map(|r| (k.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Header plus one line per row, cells ordered by `columns`
    pub fn to_grid(&self, columns: &[String]) -> Grid {
        let mut grid = Vec::with_capacity(self.len() + 1);
        grid.push(columns.to_vec());
        for (_, row) in self.iter() {
            grid.push(columns.iter().map(|c| row.get(c).to_string()).collect());
        }
        grid
    }
}

/// Pad a grid with blank cells so it covers at least `rows` x `cols`.
///
/// Writing the padded grid clears whatever the previous content left beyond
/// the new extent.
pub fn pad_to_extent(grid: &mut Grid, rows: usize, cols: usize) {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0).max(cols);
    while grid.len() < rows {
        grid.push(Vec::new());
    }
    for row in grid.iter_mut() {
        row.resize(width, String::new());
    }
}

pub fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

// ============================================================================
// TESTS
// ============================================================================
