// 📥 Record Sources - Where animals and their events come from
//
// The engine pulls records through `RecordSource` and per-animal event logs
// through `EventSource`. A `Source` error from either aborts the sync. Bad
// data is scoped to one animal: rejected records and `Parse` errors on events
// skip that animal only.

use crate::error::{SyncError, SyncResult};
use crate::records::{decode_events, AnimalRecord, Event, RecordBatch};
use crate::scoring::{ScoreSnapshot, ScoringSource};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// TRAITS
// ============================================================================

pub trait RecordSource {
    /// Every animal currently in custody. Items that do not decode come back
    /// in `RecordBatch::rejected` instead of failing the fetch.
    fn fetch_animals(&self) -> SyncResult<RecordBatch>;
}

pub trait EventSource {
    /// Event log of one animal by internal id, in no particular order
    fn fetch_events(&self, animal_id: &str) -> SyncResult<Vec<Event>>;
}

// ============================================================================
// STATIC SOURCE
// ============================================================================

/// Records and events held in memory
#[derive(Debug, Default, Clone)]
pub struct StaticSource {
    pub batch: RecordBatch,
    pub events: HashMap<String, Vec<Event>>,
}

impl StaticSource {
    pub fn new(records: Vec<AnimalRecord>) -> Self {
        StaticSource::from_batch(RecordBatch::new(records))
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        StaticSource {
            batch,
            events: HashMap::new(),
        }
    }

    pub fn with_events(mut self, animal_id: &str, events: Vec<Event>) -> Self {
        self.events.insert(animal_id.to_string(), events);
        self
    }

    pub fn records(&self) -> &[AnimalRecord] {
        &self.batch.records
    }
}

impl RecordSource for StaticSource {
    fn fetch_animals(&self) -> SyncResult<RecordBatch> {
        Ok(self.batch.clone())
    }
}

impl EventSource for StaticSource {
    fn fetch_events(&self, animal_id: &str) -> SyncResult<Vec<Event>> {
        Ok(self.events.get(animal_id).cloned().unwrap_or_default())
    }
}

// ============================================================================
// JSON FILE SOURCE
// ============================================================================

/// Records from a JSON array file (the `animals` payload saved to disk) and
/// events from a JSON object mapping internal id -> event array.
///
/// Records follow the same per-item policy as the API. The events file is
/// parsed once when attached; each animal's log is decoded on request.
pub struct JsonFileSource {
    records_path: PathBuf,
    events: HashMap<String, Vec<Value>>,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(records_path: P) -> Self {
        JsonFileSource {
            records_path: records_path.as_ref().to_path_buf(),
            events: HashMap::new(),
        }
    }

    pub fn with_events<P: AsRef<Path>>(mut self, events_path: P) -> SyncResult<Self> {
        let path = events_path.as_ref();
        let content = Self::read(path)?;
        self.events = serde_json::from_str(&content)
            .map_err(|e| SyncError::Source(format!("invalid events in {}: {}", path.display(), e)))?;
        info!(animals = self.events.len(), path = %path.display(), "loaded events file");
        Ok(self)
    }

    fn read(path: &Path) -> SyncResult<String> {
        fs::read_to_string(path)
            .map_err(|e| SyncError::Source(format!("failed to read {}: {}", path.display(), e)))
    }

    pub fn load(&self) -> SyncResult<RecordBatch> {
        let content = Self::read(&self.records_path)?;
        let items: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            SyncError::Source(format!("invalid records in {}: {}", self.records_path.display(), e))
        })?;

        let batch = RecordBatch::decode(items);
        info!(
            records = batch.records.len(),
            rejected = batch.rejected.len(),
            path = %self.records_path.display(),
            "loaded records file"
        );
        Ok(batch)
    }
}

impl RecordSource for JsonFileSource {
    fn fetch_animals(&self) -> SyncResult<RecordBatch> {
        self.load()
    }
}

impl EventSource for JsonFileSource {
    fn fetch_events(&self, animal_id: &str) -> SyncResult<Vec<Event>> {
        match self.events.get(animal_id) {
            Some(items) => decode_events(items.clone(), animal_id),
            None => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// PUBLISHED SCORES
// ============================================================================

/// Scores as the shelter publishes them: the `Dogs: N` style attributes of
/// each record, keyed by public id
pub struct PublishedScoring {
    scores: HashMap<String, ScoreSnapshot>,
}

impl PublishedScoring {
    pub fn from_records(records: &[AnimalRecord]) -> Self {
        let scores = records
            .iter()
            .map(|record| {
                let profile = record.behavior();
                let snapshot = ScoreSnapshot {
                    dogs: profile.dogs.unwrap_or(0),
                    kids: profile.kids.unwrap_or(0),
                    cats: profile.cats.unwrap_or(0),
                    home: profile.home.unwrap_or(0),
                    energy: profile.energy,
                };
                (record.public_id.clone(), snapshot)
            })
            .collect();
        PublishedScoring { scores }
    }
}

impl ScoringSource for PublishedScoring {
    fn fetch(&self, public_id: &str) -> SyncResult<ScoreSnapshot> {
        self.scores.get(public_id).copied().ok_or_else(|| {
            SyncError::ScoringUnavailable(format!("{} is not published", public_id))
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Attribute;
    use crate::scoring::EnergyLevel;
    use std::io::Write;

    const RECORDS: &str = r#"[
        {"Internal-ID": "1", "ID": 10, "Name": "Rex", "Type": "Dog",
         "Attributes": [{"AttributeName": "Dogs: 4", "Publish": "Yes"},
                        {"AttributeName": "Energy: Low", "Publish": "Yes"}],
         "LastIntakeUnixTime": "1600000000"},
        {"Internal-ID": 2, "Name": "Tom", "Type": "Cat"}
    ]"#;

    const EVENTS: &str = r#"{
        "1": [{"Type": "Intake.Stray", "Time": "1600000000"},
              {"Type": "Outcome.Adopt", "Time": 1600086400}],
        "3": [{"Type": "Intake.Stray", "Time": "0"},
              {"Time": 5}]
    }"#;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_json_file_source_reads_records_and_events() {
        let records = write(RECORDS);
        let events = write(EVENTS);
        let source = JsonFileSource::new(records.path()).with_events(events.path()).unwrap();

        let batch = source.fetch_animals().unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.records[1].internal_id, "2");

        assert_eq!(source.fetch_events("1").unwrap().len(), 2);
        assert!(source.fetch_events("2").unwrap().is_empty());
    }

    #[test]
    fn test_missing_or_invalid_file_is_source_error() {
        let source = JsonFileSource::new("/nonexistent/animals.json");
        assert!(matches!(source.fetch_animals(), Err(SyncError::Source(_))));

        let bad = write("{not json");
        let source = JsonFileSource::new(bad.path());
        assert!(matches!(source.fetch_animals(), Err(SyncError::Source(_))));

        let records = write(RECORDS);
        let result = JsonFileSource::new(records.path()).with_events("/nonexistent/events.json");
        assert!(matches!(result, Err(SyncError::Source(_))));
    }

    #[test]
    fn test_malformed_record_is_rejected_not_fatal() {
        let records = write(
            r#"[{"Internal-ID": "1", "Name": "Rex", "Type": "Dog", "Age": null},
                {"Internal-ID": "2", "Name": "Luna", "Type": "Dog", "Age": "old"},
                {"Internal-ID": "3", "Name": "Max", "Type": "Dog", "Age": 12}]"#,
        );

        let batch = JsonFileSource::new(records.path()).fetch_animals().unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].name, "Max");
        let names: Vec<&str> = batch.rejected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Rex", "Luna"]);
    }

    #[test]
    fn test_malformed_event_is_parse_error_for_that_animal() {
        let records = write(RECORDS);
        let events = write(EVENTS);
        let source = JsonFileSource::new(records.path()).with_events(events.path()).unwrap();

        assert!(matches!(source.fetch_events("3"), Err(SyncError::Parse(_))));
        assert!(source.fetch_events("1").is_ok());
    }

    #[test]
    fn test_events_file_is_read_once() {
        let records = write(RECORDS);
        let events = write(EVENTS);
        let source = JsonFileSource::new(records.path()).with_events(events.path()).unwrap();

        events.close().unwrap();

        assert_eq!(source.fetch_events("1").unwrap().len(), 2);
        assert_eq!(source.fetch_events("1").unwrap().len(), 2);
    }

    #[test]
    fn test_no_events_file_means_no_events() {
        let records = write(RECORDS);
        let source = JsonFileSource::new(records.path());
        assert!(source.fetch_events("1").unwrap().is_empty());
    }

    #[test]
    fn test_published_scoring_from_attributes() {
        let records = write(RECORDS);
        let batch = JsonFileSource::new(records.path()).fetch_animals().unwrap();
        let scoring = PublishedScoring::from_records(&batch.records);

        let rex = scoring.fetch("10").unwrap();
        assert_eq!(rex.dogs, 4);
        assert_eq!(rex.kids, 0);
        assert_eq!(rex.energy, Some(EnergyLevel::Low));
        assert!(matches!(scoring.fetch("99"), Err(SyncError::ScoringUnavailable(_))));
    }

    #[test]
    fn test_static_source_events_by_id() {
        let mut record: AnimalRecord = serde_json::from_str(
            r#"{"Internal-ID": "7", "Name": "Luna"}"#,
        )
        .unwrap();
        record.attributes.push(Attribute::new("Quiet"));

        let source = StaticSource::new(vec![record])
            .with_events("7", vec![Event::new("Intake.Stray", 5)]);

        assert_eq!(source.fetch_animals().unwrap().records[0].name, "Luna");
        assert_eq!(source.records().len(), 1);
        assert_eq!(source.fetch_events("7").unwrap().len(), 1);
        assert!(source.fetch_events("8").unwrap().is_empty());
    }
}
