// 💾 Tabular Stores - Where the working, archive and legacy tables live
//
// Each backend exposes the same three operations per named table: read the
// whole grid, overwrite rows from an offset, and report the current extent.
// The engine only ever talks to `TabularStore`.

pub mod csv_store;
pub mod sqlite_store;

pub use csv_store::CsvStore;
pub use sqlite_store::SqliteStore;

use crate::config::TableSpec;
use crate::error::SyncResult;
use crate::table::{Grid, KeyedTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// Audit record of something a sync did to a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub table: String,
    pub key: String,
    pub data: serde_json::Value,
}

impl SyncEvent {
    pub fn new(event_type: &str, table: &str, key: &str, data: serde_json::Value) -> Self {
        SyncEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            table: table.to_string(),
            key: key.to_string(),
            data,
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait TabularStore {
    /// Every row of the table; a table that does not exist yet is empty
    fn read_grid(&self, table: &str) -> SyncResult<Grid>;

    /// Keep rows before `offset`, replace everything from there on with `rows`
    fn replace_rows(&mut self, table: &str, offset: usize, rows: &Grid) -> SyncResult<()>;

    /// (rows, columns) currently occupied
    fn extent(&self, table: &str) -> SyncResult<(usize, usize)>;

    /// Backends without an audit trail ignore events
    fn record_event(&mut self, _event: &SyncEvent) -> SyncResult<()> {
        Ok(())
    }

    fn read_table(&self, spec: &TableSpec) -> SyncResult<KeyedTable> {
        KeyedTable::from_grid(&self.read_grid(&spec.name)?, spec)
    }
}

pub(crate) fn grid_extent(grid: &Grid) -> (usize, usize) {
    (grid.len(), grid.iter().map(Vec::len).max().unwrap_or(0))
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// Grids held in memory, written verbatim (blank padding included)
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, Grid>,
    events: Vec<SyncEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_table(mut self, table: &str, grid: Grid) -> Self {
        self.tables.insert(table.to_string(), grid);
        self
    }

    pub fn events(&self) -> &[SyncEvent] {
        &self.events
    }
}

impl TabularStore for MemoryStore {
    fn read_grid(&self, table: &str) -> SyncResult<Grid> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    fn replace_rows(&mut self, table: &str, offset: usize, rows: &Grid) -> SyncResult<()> {
        let grid = self.tables.entry(table.to_string()).or_default();
        grid.truncate(offset);
        while grid.len() < offset {
            grid.push(Vec::new());
        }
        grid.extend(rows.iter().cloned());
        Ok(())
    }

    fn extent(&self, table: &str) -> SyncResult<(usize, usize)> {
        Ok(self.tables.get(table).map(grid_extent).unwrap_or((0, 0)))
    }

    fn record_event(&mut self, event: &SyncEvent) -> SyncResult<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_memory_store_replace_from_offset() {
        let mut store = MemoryStore::new().with_table(
            "Dogs",
            cells(&[&["Roster"], &["Name", "Notes"], &["Rex", "x"], &["Luna", "y"]]),
        );

        store
            .replace_rows("Dogs", 1, &cells(&[&["Name", "Notes"], &["Max", "z"]]))
            .unwrap();

        let grid = store.read_grid("Dogs").unwrap();
        assert_eq!(grid, cells(&[&["Roster"], &["Name", "Notes"], &["Max", "z"]]));
        assert_eq!(store.extent("Dogs").unwrap(), (3, 2));
    }

    #[test]
    fn test_missing_table_is_empty() {
        let store = MemoryStore::new();
        assert!(store.read_grid("Nope").unwrap().is_empty());
        assert_eq!(store.extent("Nope").unwrap(), (0, 0));
        assert!(store.read_table(&TableSpec::new("Nope", "Name")).unwrap().is_empty());
    }

    #[test]
    fn test_events_are_kept() {
        let mut store = MemoryStore::new();
        store
            .record_event(&SyncEvent::new("archived", "Archive", "Rex", serde_json::json!({})))
            .unwrap();
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.events()[0].key, "Rex");
    }
}
