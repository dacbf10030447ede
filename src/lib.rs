// Shelter Sync - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod config;
pub mod records;        // Animal records, events, location, attributes
pub mod residency;      // Days-in-custody state machine
pub mod eligibility;    // Which animals are active this sync
pub mod scoring;        // Energy table, score comparison, update sink
pub mod table;          // Keyed rows over raw grids
pub mod store;          // CSV / SQLite / memory backends
pub mod reconcile;      // Per-field fallback chain
pub mod archive;        // Departed rows -> archive, pruning
pub mod source;         // Record and event sources
pub mod api;            // Paginated HTTP client
pub mod recent;         // Recent intakes listing
pub mod sync;           // The engine tying it together
pub mod logging;

// Re-export commonly used types
pub use error::{SyncError, SyncResult};
pub use config::{EligibilityRules, SyncConfig, TableSpec};
pub use records::{
    decode_events, AnimalRecord, Attribute, BehaviorProfile, Event, EventKind, Location, RawTime,
    RecordBatch, RecordIndex, SkippedAnimal, SECONDS_PER_DAY,
};
pub use residency::{compute as compute_residency, residency_days, CustodyState, Residency};
pub use eligibility::{Eligibility, EligibilityFilter, ExclusionReason};
pub use scoring::{
    EnergyLevel, LogUpdateSink, NoScoring, ScoreDecision, ScoreSnapshot, ScoreStatus,
    ScoringSource, StaticScoring, UpdateRequest, UpdateSink,
};
pub use table::{Grid, KeyedTable, Row};
pub use store::{CsvStore, MemoryStore, SqliteStore, SyncEvent, TabularStore};
pub use reconcile::{EditableField, FieldReconciler, FieldSource, EDITABLE_FIELDS, OUTPUT_COLUMNS};
pub use archive::{ArchiveDiffer, ArchivePlan};
pub use source::{EventSource, JsonFileSource, PublishedScoring, RecordSource, StaticSource};
pub use api::{HttpUpdateSink, ShelterluvClient};
pub use recent::{age_text, newer_than_days, RecentIntake};
pub use sync::{Collaborators, SyncEngine, SyncPlan, SyncReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
