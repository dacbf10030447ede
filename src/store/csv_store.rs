// CSV Store - One CSV file per table in a directory
//
// `Dogs` lives in `<dir>/Dogs.csv`. Trailing blank rows are dropped on write,
// so clearing a row really removes it from the file.

use super::{grid_extent, TabularStore};
use crate::error::{SyncError, SyncResult};
use crate::table::{is_blank_row, Grid};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> SyncResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            SyncError::Store(format!("failed to create {}: {}", dir.display(), e))
        })?;
        Ok(CsvStore { dir })
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }
}

impl TabularStore for CsvStore {
    fn read_grid(&self, table: &str) -> SyncResult<Grid> {
        let path = self.path_for(table);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)?;

        let mut grid = Vec::new();
        for record in rdr.records() {
            let record = record?;
            grid.push(record.iter().map(str::to_string).collect());
        }

        debug!(table, rows = grid.len(), "read csv table");
        Ok(grid)
    }

    fn replace_rows(&mut self, table: &str, offset: usize, rows: &Grid) -> SyncResult<()> {
        let mut grid = self.read_grid(table)?;
        grid.truncate(offset);
        while grid.len() < offset {
            grid.push(Vec::new());
        }
        grid.extend(rows.iter().cloned());
        while grid.len() > offset && grid.last().map_or(false, |r| is_blank_row(r)) {
            grid.pop();
        }

        // Write to a sibling file first so a crash never leaves half a table
        let path = self.path_for(table);
        let tmp = path.with_extension("csv.tmp");
        {
            let mut wtr = csv::WriterBuilder::new().flexible(true).from_path(&tmp)?;
            for row in &grid {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(table, rows = grid.len(), "wrote csv table");
        Ok(())
    }

    fn extent(&self, table: &str) -> SyncResult<(usize, usize)> {
        Ok(grid_extent(&self.read_grid(table)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvStore::open(dir.path()).unwrap();

        let grid = cells(&[&["Name", "Notes"], &["Rex", "likes, commas"], &["Luna", ""]]);
        store.replace_rows("Dogs", 0, &grid).unwrap();

        assert!(store.path_for("Dogs").exists());
        assert_eq!(store.read_grid("Dogs").unwrap(), grid);
        assert_eq!(store.extent("Dogs").unwrap(), (3, 2));
    }

    #[test]
    fn test_trailing_blank_rows_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvStore::open(dir.path()).unwrap();

        store
            .replace_rows("Dogs", 0, &cells(&[&["Name"], &["Rex"], &["Luna"], &["Max"]]))
            .unwrap();
        store
            .replace_rows("Dogs", 0, &cells(&[&["Name"], &["Rex"], &[""], &[""]]))
            .unwrap();

        assert_eq!(store.read_grid("Dogs").unwrap(), cells(&[&["Name"], &["Rex"]]));
    }

    #[test]
    fn test_offset_preserves_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CsvStore::open(dir.path()).unwrap();

        store
            .replace_rows("Dogs", 0, &cells(&[&["Roster, do not edit"], &["Name"], &["Rex"]]))
            .unwrap();
        store.replace_rows("Dogs", 1, &cells(&[&["Name"], &["Max"]])).unwrap();

        assert_eq!(
            store.read_grid("Dogs").unwrap(),
            cells(&[&["Roster, do not edit"], &["Name"], &["Max"]])
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        assert!(store.read_grid("Original").unwrap().is_empty());
    }
}
