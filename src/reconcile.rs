// 🔀 Field Reconciler - Merge one live record with its persisted history
//
// Derived columns are recomputed from the live record every sync. Editable
// columns survive syncs: each one is resolved on its own through the chain
// working -> archive -> legacy (renamed column) -> declared default.

use crate::records::AnimalRecord;
use crate::scoring::{decide, energy_label, EnergyLevel, ScoreDecision, ScoreSnapshot, ScoreStatus};
use crate::table::{KeyedTable, Row};
use serde::Serialize;
use tracing::debug;

// ============================================================================
// COLUMNS
// ============================================================================

pub mod columns {
    pub const NAME: &str = "Name";
    pub const WEB_ID: &str = "Web ID";
    pub const BREED: &str = "Breed";
    pub const AGE: &str = "Age";
    pub const SEX: &str = "Sex";
    pub const SIZE: &str = "Size";
    pub const LOCATION: &str = "Location";
    pub const DAYS_SINCE_INTAKE: &str = "Days Since Intake";
    pub const TOTAL_DAYS: &str = "Total Days";
    pub const ENERGY_TAG: &str = "Energy Tag";
    pub const BEHAVIOR: &str = "Behavior";
    pub const DOGS: &str = "Dogs";
    pub const KIDS: &str = "Kids";
    pub const CATS: &str = "Cats";
    pub const HOME: &str = "Home";
    pub const ENERGY: &str = "Energy";
    pub const NOTES: &str = "Notes";
    pub const TOYS: &str = "Toys";
    pub const HOME_NOTES: &str = "Home Notes";
    pub const LAST_UPDATED: &str = "Last Updated";
    pub const SCORES_MATCH: &str = "Scores Match";
}

/// Column order of the working and archive tables
pub const OUTPUT_COLUMNS: [&str; 21] = [
    columns::NAME,
    columns::WEB_ID,
    columns::BREED,
    columns::AGE,
    columns::SEX,
    columns::SIZE,
    columns::LOCATION,
    columns::DAYS_SINCE_INTAKE,
    columns::TOTAL_DAYS,
    columns::ENERGY_TAG,
    columns::BEHAVIOR,
    columns::DOGS,
    columns::KIDS,
    columns::CATS,
    columns::HOME,
    columns::ENERGY,
    columns::NOTES,
    columns::TOYS,
    columns::HOME_NOTES,
    columns::LAST_UPDATED,
    columns::SCORES_MATCH,
];

pub fn output_columns() -> Vec<String> {
    OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// EDITABLE FIELDS
// ============================================================================

/// A column volunteers edit by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditableField {
    pub column: &'static str,
    /// Name of the same field in the legacy table
    pub legacy_column: &'static str,
    /// Written when no source has a value
    pub default: &'static str,
}

pub const EDITABLE_FIELDS: [EditableField; 9] = [
    EditableField { column: columns::DOGS, legacy_column: "Dog Score", default: "0" },
    EditableField { column: columns::KIDS, legacy_column: "Kid Score", default: "0" },
    EditableField { column: columns::CATS, legacy_column: "Cat Score", default: "0" },
    EditableField { column: columns::HOME, legacy_column: "Home Score", default: "0" },
    EditableField { column: columns::ENERGY, legacy_column: "Energy Level", default: "" },
    EditableField { column: columns::NOTES, legacy_column: "Comments", default: "" },
    EditableField { column: columns::TOYS, legacy_column: "Favorite Toys", default: "" },
    EditableField { column: columns::HOME_NOTES, legacy_column: "Home Notes?", default: "" },
    EditableField { column: columns::LAST_UPDATED, legacy_column: "Updated", default: "" },
];

/// Declared default of a working/archive column; non-editable columns default to ""
pub fn default_for(column: &str) -> &'static str {
    EDITABLE_FIELDS
        .iter()
        .find(|f| f.column == column)
        .map(|f| f.default)
        .unwrap_or("")
}

/// A cell holding nothing beyond blanks or the declared default. A `"0"`
/// score is "unknown", so it never shadows a real score further down the
/// chain and never keeps an archive row alive.
pub fn is_unset(value: &str, default: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == default
}

// ============================================================================
// FALLBACK CHAIN
// ============================================================================

/// Where a reconciled value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldSource {
    Working,
    Archive,
    Legacy,
    Default,
}

/// The persisted rows known for one animal, highest priority first
#[derive(Debug, Clone, Copy, Default)]
pub struct Fallbacks<'a> {
    pub working: Option<&'a Row>,
    pub archive: Option<&'a Row>,
    pub legacy: Option<&'a Row>,
}

impl<'a> Fallbacks<'a> {
    /// Ordered (source, row, column) lookups for one field
    fn chain(&self, field: &EditableField) -> [(FieldSource, Option<&'a Row>, &'static str); 3] {
        [
            (FieldSource::Working, self.working, field.column),
            (FieldSource::Archive, self.archive, field.column),
            (FieldSource::Legacy, self.legacy, field.legacy_column),
        ]
    }

    /// First set value along the chain, else the declared default
    pub fn resolve(&self, field: &EditableField) -> (String, FieldSource) {
        self.chain(field)
            .into_iter()
            .find_map(|(source, row, column)| {
                row.and_then(|r| r.non_empty(column))
                    .filter(|value| !is_unset(value, field.default))
                    .map(|value| (value.to_string(), source))
            })
            .unwrap_or_else(|| (field.default.to_string(), FieldSource::Default))
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Output of one reconciliation
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub row: Row,
    /// Scores as they now stand in the row
    pub scores: ScoreSnapshot,
    /// `None` when score comparison is disabled
    pub decision: Option<ScoreDecision>,
    pub sources: Vec<(&'static str, FieldSource)>,
}

pub struct FieldReconciler<'a> {
    working: &'a KeyedTable,
    archive: &'a KeyedTable,
    legacy: &'a KeyedTable,
}

impl<'a> FieldReconciler<'a> {
    pub fn new(working: &'a KeyedTable, archive: &'a KeyedTable, legacy: &'a KeyedTable) -> Self {
        FieldReconciler {
            working,
            archive,
            legacy,
        }
    }

    pub fn fallbacks(&self, name: &str) -> Fallbacks<'a> {
        Fallbacks {
            working: self.working.get(name),
            archive: self.archive.get(name),
            legacy: self.legacy.get(name),
        }
    }

    /// Build the row for one active animal.
    ///
    /// `published` is the scoring page snapshot; pass `None` to skip the
    /// comparison, which leaves "Scores Match" blank.
    pub fn reconcile(
        &self,
        record: &AnimalRecord,
        days_since_intake: i64,
        total_days: i64,
        published: Option<&ScoreSnapshot>,
    ) -> Reconciled {
        let behavior = record.behavior();
        let energy_tag = energy_label(behavior.energy);

        let mut row = Row::new()
            .with(columns::NAME, &record.name)
            .with(columns::WEB_ID, &record.public_id)
            .with(columns::BREED, &record.breed)
            .with(columns::AGE, &record.age_years())
            .with(columns::SEX, &record.sex)
            .with(columns::SIZE, &record.size)
            .with(columns::LOCATION, &record.location_label())
            .with(columns::DAYS_SINCE_INTAKE, &days_since_intake.to_string())
            .with(columns::TOTAL_DAYS, &total_days.to_string())
            .with(columns::ENERGY_TAG, energy_tag)
            .with(columns::BEHAVIOR, &behavior.tags_joined());

        let fallbacks = self.fallbacks(&record.name);
        let mut sources = Vec::with_capacity(EDITABLE_FIELDS.len());
        for field in &EDITABLE_FIELDS {
            let (value, source) = fallbacks.resolve(field);
            debug!(animal = %record.name, column = field.column, ?source, "resolved field");
            row.set(field.column, &value);
            sources.push((field.column, source));
        }

        let scores = snapshot_from_row(&row);
        let previous = fallbacks
            .working
            .and_then(|r| ScoreStatus::parse(r.get(columns::SCORES_MATCH)));

        let decision = published.map(|published| decide(&scores, published, previous));
        row.set(
            columns::SCORES_MATCH,
            decision.map(|d| d.status.as_str()).unwrap_or(""),
        );

        Reconciled {
            row,
            scores,
            decision,
            sources,
        }
    }
}

/// Read the four scores and the energy label back out of a row; anything
/// unparseable counts as unknown
pub fn snapshot_from_row(row: &Row) -> ScoreSnapshot {
    let score = |column: &str| row.get(column).trim().parse::<u8>().unwrap_or(0);
    ScoreSnapshot {
        dogs: score(columns::DOGS),
        kids: score(columns::KIDS),
        cats: score(columns::CATS),
        home: score(columns::HOME),
        energy: EnergyLevel::from_label(row.get(columns::ENERGY)),
    }
}

// ============================================================================
// TESTS
// ============================================================================
