// 🔄 Sync Engine - One full pass from the live feed to the tables
//
// Phases:
//   1. fetch records (source failure aborts, nothing written)
//   2. read working, archive and legacy tables
//   3. filter, compute residency, reconcile each eligible animal
//   4. diff the archive
//   5. write working, then archive, then audit events, then push updates
//
// The two table writes are not atomic. A crash between them leaves the
// working table updated and the archive stale, and the rows that departed in
// that run are not re-archived by the next one.

use crate::archive::{ArchiveDiffer, ArchivePlan};
use crate::config::{SyncConfig, TableSpec};
use crate::eligibility::{Eligibility, EligibilityFilter};
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{output_columns, FieldReconciler};
use crate::records::{AnimalRecord, SkippedAnimal};
use crate::residency;
use crate::scoring::{fetch_or_unknown, ScoreStatus, ScoringSource, UpdateRequest, UpdateSink};
use crate::source::{EventSource, RecordSource};
use crate::store::{SyncEvent, TabularStore};
use crate::table::{pad_to_extent, KeyedTable, Row};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub excluded: HashMap<String, usize>,
    pub skipped: Vec<SkippedAnimal>,
    pub active: usize,
    pub archived: Vec<String>,
    pub pruned: Vec<String>,
    pub reactivated: Vec<String>,
    pub mismatched: Vec<String>,
    pub updates_pushed: usize,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

// ============================================================================
// PLAN
// ============================================================================

/// Everything a sync will write, computed without touching the store
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub working: KeyedTable,
    pub archive: ArchivePlan,
    pub updates: Vec<UpdateRequest>,
    pub report: SyncReport,
}

// ============================================================================
// ENGINE
// ============================================================================

/// External systems the engine talks to
pub struct Collaborators<'a> {
    pub records: &'a dyn RecordSource,
    pub events: &'a dyn EventSource,
    pub scoring: &'a dyn ScoringSource,
    pub updates: &'a dyn UpdateSink,
}

pub struct SyncEngine<'a> {
    config: SyncConfig,
    filter: EligibilityFilter,
    collaborators: Collaborators<'a>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(config: SyncConfig, collaborators: Collaborators<'a>) -> SyncResult<Self> {
        config.validate()?;
        Ok(SyncEngine {
            filter: EligibilityFilter::new(config.eligibility.clone()),
            config,
            collaborators,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Plan and apply; with `dry_run` nothing is written or pushed
    pub fn run(&self, store: &mut dyn TabularStore, now: i64, dry_run: bool) -> SyncResult<SyncReport> {
        let mut plan = self.plan(&*store, now)?;
        plan.report.dry_run = dry_run;

        if dry_run {
            info!(
                active = plan.report.active,
                archived = plan.report.archived.len(),
                "dry run, nothing written"
            );
            return Ok(plan.report);
        }

        self.apply(store, &mut plan)?;
        Ok(plan.report)
    }

    pub fn plan(&self, store: &dyn TabularStore, now: i64) -> SyncResult<SyncPlan> {
        let batch = self.collaborators.records.fetch_animals()?;
        info!(
            count = batch.records.len(),
            rejected = batch.rejected.len(),
            "fetched records"
        );

        let previous = store.read_table(&self.config.working)?;
        let archive = store.read_table(&self.config.archive)?;
        let legacy = store.read_table(&self.config.legacy)?;
        info!(
            working = previous.len(),
            archive = archive.len(),
            legacy = legacy.len(),
            "read tables"
        );

        let reconciler = FieldReconciler::new(&previous, &archive, &legacy);
        let mut working = KeyedTable::new(&self.config.working.key_column, output_columns());
        let mut updates = Vec::new();
        let mut report = SyncReport {
            fetched: batch.total(),
            ..SyncReport::default()
        };
        for rejected in &batch.rejected {
            warn!(animal = %rejected.name, reason = %rejected.reason, "skipping unreadable record");
        }
        report.skipped.extend(batch.rejected.iter().cloned());

        for record in &batch.records {
            let record = match self.filter.classify(record) {
                Eligibility::Eligible(record) => record,
                Eligibility::Excluded(reason) => {
                    *report.excluded.entry(reason.as_str().to_string()).or_default() += 1;
                    continue;
                }
            };

            let (days_since, total_days) = match self.derive_days(&record, now) {
                Ok(days) => days,
                Err(err) if err.is_per_animal() => {
                    warn!(animal = %record.name, error = %err, "skipping animal");
                    report.skipped.push(SkippedAnimal {
                        name: record.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let published = self
                .config
                .compare_scores
                .then(|| fetch_or_unknown(self.collaborators.scoring, &record.public_id));

            let reconciled = reconciler.reconcile(&record, days_since, total_days, published.as_ref());
            if let Some(decision) = reconciled.decision {
                if decision.push_update {
                    updates.push(UpdateRequest::new(&record.public_id, &record.name, &reconciled.scores));
                }
                if decision.status == ScoreStatus::Mismatch {
                    report.mismatched.push(record.name.clone());
                }
            }

            if working.contains(&record.name) {
                warn!(animal = %record.name, "duplicate name in feed, keeping the later record");
            }
            working.insert(&record.name, reconciled.row);
        }

        report.active = working.len();
        info!(
            active = report.active,
            excluded = report.excluded_total(),
            skipped = report.skipped.len(),
            "reconciled records"
        );

        let archive = ArchiveDiffer::diff(&previous, &working, archive);
        report.archived = archive.moved.clone();
        report.pruned = archive.pruned.clone();
        report.reactivated = archive.reactivated.clone();

        Ok(SyncPlan {
            working,
            archive,
            updates,
            report,
        })
    }

    /// (days since last intake, total days in custody)
    fn derive_days(&self, record: &AnimalRecord, now: i64) -> SyncResult<(i64, i64)> {
        let days_since = record.days_since_intake(now)?;
        let events = self.collaborators.events.fetch_events(&record.internal_id)?;
        let total = residency::residency_days(&events, now)?;
        Ok((days_since, total))
    }

    pub fn apply(&self, store: &mut dyn TabularStore, plan: &mut SyncPlan) -> SyncResult<()> {
        write_table(store, &self.config.working, &plan.working, &output_columns())?;
        info!(table = %self.config.working.name, rows = plan.working.len(), "wrote working table");

        let mut archive_columns = output_columns();
        for column in plan.archive.archive.columns() {
            if !archive_columns.contains(column) {
                archive_columns.push(column.clone());
            }
        }
        write_table(store, &self.config.archive, &plan.archive.archive, &archive_columns)?;
        info!(table = %self.config.archive.name, rows = plan.archive.archive.len(), "wrote archive table");

        let archive_name = &self.config.archive.name;
        for key in &plan.archive.moved {
            let data = plan.archive.archive.get(key).map(row_json).unwrap_or_default();
            store.record_event(&SyncEvent::new("archived", archive_name, key, data))?;
        }
        for key in &plan.archive.pruned {
            store.record_event(&SyncEvent::new("pruned", archive_name, key, serde_json::Value::Null))?;
        }
        for key in &plan.archive.reactivated {
            store.record_event(&SyncEvent::new("reactivated", archive_name, key, serde_json::Value::Null))?;
        }

        for request in &plan.updates {
            self.collaborators.updates.push(request);
        }
        plan.report.updates_pushed = plan.updates.len();

        let summary = serde_json::to_value(&plan.report)
            .map_err(|e| SyncError::Store(format!("failed to encode report: {}", e)))?;
        store.record_event(&SyncEvent::new(
            "sync_completed",
            &self.config.working.name,
            "",
            summary,
        ))?;

        info!(
            archived = plan.report.archived.len(),
            pruned = plan.report.pruned.len(),
            updates = plan.report.updates_pushed,
            "sync complete"
        );
        Ok(())
    }
}

/// Replace a table's rows from its header down, clearing whatever the
/// previous content occupied beyond the new extent
pub fn write_table(
    store: &mut dyn TabularStore,
    spec: &TableSpec,
    table: &KeyedTable,
    columns: &[String],
) -> SyncResult<()> {
    let (rows, cols) = store.extent(&spec.name)?;
    let mut grid = table.to_grid(columns);
    pad_to_extent(&mut grid, rows.saturating_sub(spec.header_offset), cols);
    store.replace_rows(&spec.name, spec.header_offset, &grid)
}

fn row_json(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(
        row.iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect(),
    )
}

// ============================================================================
// TESTS
// ============================================================================
