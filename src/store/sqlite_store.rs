// SQLite Store - Every table as sparse cells in one database
//
// Cells are keyed by (sheet, row, col); blank cells are never stored, so the
// extent of a table is simply its highest occupied row and column. The
// `sync_events` table keeps the audit trail of archive moves and completed
// syncs.

use super::{SyncEvent, TabularStore};
use crate::error::SyncResult;
use crate::table::Grid;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        // Crash recovery for the file-backed case
        conn.pragma_update(None, "journal_mode", "WAL")?;
        SqliteStore::from_connection(conn)
    }

    pub fn open_in_memory() -> SyncResult<Self> {
        SqliteStore::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        setup_schema(&conn)?;
        Ok(SqliteStore { conn })
    }

    /// Audit events for one key of one table, newest first
    pub fn events_for(&self, table: &str, key: &str) -> SyncResult<Vec<SyncEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, table_name, row_key, data
             FROM sync_events
             WHERE table_name = ?1 AND row_key = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let events = stmt
            .query_map(params![table, key], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(5)?;

                Ok(SyncEvent {
                    event_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                    event_type: row.get(2)?,
                    table: row.get(3)?,
                    key: row.get(4)?,
                    data: serde_json::from_str(&data_json)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    pub fn event_count(&self) -> SyncResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_events", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn setup_schema(conn: &Connection) -> SyncResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cells (
            sheet TEXT NOT NULL,
            row_idx INTEGER NOT NULL,
            col_idx INTEGER NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (sheet, row_idx, col_idx)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            table_name TEXT NOT NULL,
            row_key TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_events_key ON sync_events(table_name, row_key)",
        [],
    )?;

    Ok(())
}

impl TabularStore for SqliteStore {
    fn read_grid(&self, table: &str) -> SyncResult<Grid> {
        let mut stmt = self.conn.prepare(
            "SELECT row_idx, col_idx, value FROM cells WHERE sheet = ?1 ORDER BY row_idx, col_idx",
        )?;

        let cells = stmt
            .query_map(params![table], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut grid: Grid = Vec::new();
        for (r, c, value) in cells {
            let (r, c) = (r as usize, c as usize);
            while grid.len() <= r {
                grid.push(Vec::new());
            }
            let line = &mut grid[r];
            while line.len() <= c {
                line.push(String::new());
            }
            line[c] = value;
        }

        debug!(table, rows = grid.len(), "read sqlite table");
        Ok(grid)
    }

    fn replace_rows(&mut self, table: &str, offset: usize, rows: &Grid) -> SyncResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM cells WHERE sheet = ?1 AND row_idx >= ?2",
            params![table, offset as i64],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO cells (sheet, row_idx, col_idx, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, line) in rows.iter().enumerate() {
                for (c, value) in line.iter().enumerate() {
                    if value.trim().is_empty() {
                        continue;
                    }
                    insert.execute(params![table, (offset + i) as i64, c as i64, value])?;
                }
            }
        }

        tx.commit()?;
        debug!(table, rows = rows.len(), offset, "wrote sqlite table");
        Ok(())
    }

    fn extent(&self, table: &str) -> SyncResult<(usize, usize)> {
        let (rows, cols): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MAX(row_idx), MAX(col_idx) FROM cells WHERE sheet = ?1",
            params![table],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok((
            rows.map(|r| r as usize + 1).unwrap_or(0),
            cols.map(|c| c as usize + 1).unwrap_or(0),
        ))
    }

    fn record_event(&mut self, event: &SyncEvent) -> SyncResult<()> {
        let data_json = serde_json::to_string(&event.data)
            .map_err(|e| crate::error::SyncError::Store(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO sync_events (
                event_id, timestamp, event_type, table_name, row_key, data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.table,
                event.key,
                data_json,
            ],
        )?;

        Ok(())
    }
}
