// 🗄️ Archive Differ - Move departed animals out of the working table
//
// Compares the keys the working table held before this sync with the keys of
// the new row set. Departed rows move to the archive (overwriting by key),
// then every archive row with nothing but blanks or defaults is dropped.

use crate::reconcile::{default_for, is_unset};
use crate::table::{KeyedTable, Row};
use tracing::{info, warn};

/// Archive contents after a sync plus what changed
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    pub archive: KeyedTable,
    /// Keys moved from the working table, in working-table order
    pub moved: Vec<String>,
    /// Keys dropped because every field was empty
    pub pruned: Vec<String>,
    /// Archived keys that are active again and were taken out
    pub reactivated: Vec<String>,
}

/// True when every non-key field is blank or equal to its column default,
/// the same test the fallback chain uses to skip a source
pub fn is_empty_row(row: &Row, key_column: &str) -> bool {
    row.iter()
        .filter(|(column, _)| *column != key_column)
        .all(|(column, value)| is_unset(value, default_for(column)))
}

pub struct ArchiveDiffer;

impl ArchiveDiffer {
    /// `previous` is the working table as read at the start of the sync,
    /// `active` the new row set.
    pub fn diff(previous: &KeyedTable, active: &KeyedTable, mut archive: KeyedTable) -> ArchivePlan {
        let mut reactivated = Vec::new();
        archive.retain(|key, _| {
            if active.contains(key) {
                warn!(key, "animal is active and archived, keeping the active row");
                reactivated.push(key.to_string());
                false
            } else {
                true
            }
        });

        let mut moved = Vec::new();
        for (key, row) in previous.iter() {
            if !active.contains(key) {
                archive.insert(key, row.clone());
                moved.push(key.to_string());
            }
        }

        let key_column = archive.key_column().to_string();
        let mut pruned = Vec::new();
        archive.retain(|key, row| {
            if is_empty_row(row, &key_column) {
                pruned.push(key.to_string());
                false
            } else {
                true
            }
        });
        moved.retain(|key| archive.contains(key));

        info!(
            moved = moved.len(),
            pruned = pruned.len(),
            reactivated = reactivated.len(),
            archived = archive.len(),
            "archive diff complete"
        );

        ArchivePlan {
            archive,
            moved,
            pruned,
            reactivated,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
