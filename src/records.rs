// 🐕 Animal Records - Snapshot of the live feed
//
// Shapes follow the shelter API JSON one to one. Records and events are
// read-only for the duration of a sync and re-fetched from scratch every run.

use crate::error::{SyncError, SyncResult};
use crate::scoring::EnergyLevel;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

pub const SECONDS_PER_DAY: i64 = 60 * 60 * 24;

// ============================================================================
// RAW TIME
// ============================================================================

/// Unix timestamp as the API sends it: sometimes a number, usually a string.
///
/// Parsing is deferred so a malformed value surfaces as a `SyncError::Parse`
/// for the one animal that carries it instead of failing the whole page.
/// `Other` keeps whatever else arrived (null, floats, objects) so that it
/// fails at `parse` rather than at decode time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTime {
    Number(i64),
    Text(String),
    Other(Value),
}

impl RawTime {
    pub fn parse(&self) -> SyncResult<i64> {
        match self {
            RawTime::Number(n) => Ok(*n),
            RawTime::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| SyncError::Parse(format!("invalid unix time: {:?}", s))),
            RawTime::Other(v) => Err(SyncError::Parse(format!("invalid unix time: {}", v))),
        }
    }
}

/// A missing time field decodes to `Other(null)`
impl Default for RawTime {
    fn default() -> Self {
        RawTime::Other(Value::Null)
    }
}

impl From<i64> for RawTime {
    fn from(value: i64) -> Self {
        RawTime::Number(value)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// ============================================================================
// LOCATION
// ============================================================================

/// Hierarchical placement: Tier2 is the facility, Tier3 the ward, Tier4 the kennel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "Tier1", default, skip_serializing_if = "Option::is_none")]
    pub tier1: Option<String>,

    #[serde(rename = "Tier2", default, skip_serializing_if = "Option::is_none")]
    pub tier2: Option<String>,

    #[serde(rename = "Tier3", default, skip_serializing_if = "Option::is_none")]
    pub tier3: Option<String>,

    #[serde(rename = "Tier4", default, skip_serializing_if = "Option::is_none")]
    pub tier4: Option<String>,
}

impl Location {
    /// Placeholder used for animals that are deliberately treated as unlocated
    pub fn unlocated() -> Self {
        Location {
            tier1: None,
            tier2: None,
            tier3: Some(String::new()),
            tier4: Some(String::new()),
        }
    }

    pub fn ward(ward: &str) -> Self {
        Location {
            tier3: Some(ward.to_string()),
            ..Location::default()
        }
    }

    pub fn tier2(&self) -> &str {
        self.tier2.as_deref().unwrap_or("")
    }

    pub fn tier3(&self) -> &str {
        self.tier3.as_deref().unwrap_or("")
    }

    pub fn tier4(&self) -> &str {
        self.tier4.as_deref().unwrap_or("")
    }

    /// "Ward, Kennel" skipping empty tiers
    pub fn label(&self) -> String {
        [self.tier3(), self.tier4()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "AttributeName")]
    pub name: String,

    #[serde(rename = "Publish", default)]
    pub publish: String,
}

impl Attribute {
    pub fn new(name: &str) -> Self {
        Attribute {
            name: name.to_string(),
            publish: "Yes".to_string(),
        }
    }

    pub fn is_published(&self) -> bool {
        !self.publish.eq_ignore_ascii_case("no")
    }
}

/// Scores and tags decoded from the free-text attribute list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorProfile {
    pub dogs: Option<u8>,
    pub kids: Option<u8>,
    pub cats: Option<u8>,
    pub home: Option<u8>,
    pub energy: Option<EnergyLevel>,
    pub tags: Vec<String>,
}

impl BehaviorProfile {
    /// Decode `Dogs: 3`, `Energy: High` style attributes; anything else is a tag
    pub fn from_attributes(attributes: &[Attribute]) -> Self {
        let mut profile = BehaviorProfile::default();

        for attr in attributes.iter().filter(|a| a.is_published()) {
            let Some((label, value)) = attr.name.split_once(':') else {
                profile.tags.push(attr.name.trim().to_string());
                continue;
            };
            let value = value.trim();
            let score = value.parse::<u8>().ok().filter(|n| (1..=5).contains(n));

            match (label.trim(), score) {
                ("Dogs", Some(n)) => profile.dogs = Some(n),
                ("Kids", Some(n)) => profile.kids = Some(n),
                ("Cats", Some(n)) => profile.cats = Some(n),
                ("Home", Some(n)) => profile.home = Some(n),
                ("Energy", _) => profile.energy = EnergyLevel::from_label(value),
                _ => profile.tags.push(attr.name.trim().to_string()),
            }
        }

        profile
    }

    pub fn tags_joined(&self) -> String {
        self.tags.join(", ")
    }
}

// ============================================================================
// ANIMAL RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimalRecord {
    #[serde(rename = "Internal-ID", deserialize_with = "string_or_number")]
    pub internal_id: String,

    /// Public "web id" used by the scoring page
    #[serde(rename = "ID", default, deserialize_with = "string_or_number")]
    pub public_id: String,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type", default)]
    pub species: String,

    #[serde(rename = "Status", default)]
    pub status: String,

    #[serde(rename = "Sex", default)]
    pub sex: String,

    #[serde(rename = "Age", default)]
    pub age_months: u32,

    #[serde(rename = "Breed", default)]
    pub breed: String,

    #[serde(rename = "Size", default)]
    pub size: String,

    #[serde(rename = "CurrentLocation", default)]
    pub location: Option<Location>,

    #[serde(rename = "Attributes", default)]
    pub attributes: Vec<Attribute>,

    #[serde(rename = "LastIntakeUnixTime", default)]
    pub last_intake: Option<RawTime>,
}

impl AnimalRecord {
    pub fn last_intake_time(&self) -> SyncResult<i64> {
        match &self.last_intake {
            Some(raw) => raw.parse(),
            None => Err(SyncError::Parse(format!(
                "{}: missing LastIntakeUnixTime",
                self.name
            ))),
        }
    }

    /// Whole days between the last intake and `now`
    pub fn days_since_intake(&self, now: i64) -> SyncResult<i64> {
        Ok(now.saturating_sub(self.last_intake_time()?) / SECONDS_PER_DAY)
    }

    /// Age in years with one decimal, e.g. 18 months -> "1.5"
    pub fn age_years(&self) -> String {
        format!("{:.1}", self.age_months as f64 / 12.0)
    }

    pub fn behavior(&self) -> BehaviorProfile {
        BehaviorProfile::from_attributes(&self.attributes)
    }

    pub fn location_label(&self) -> String {
        self.location.as_ref().map(Location::label).unwrap_or_default()
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Semantic class of an event type string; only the prefix matters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Intake,
    Outcome { qualifier: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "Type")]
    pub event_type: String,

    #[serde(rename = "Time", default)]
    pub time: RawTime,
}

impl Event {
    pub fn new(event_type: &str, time: i64) -> Self {
        Event {
            event_type: event_type.to_string(),
            time: RawTime::Number(time),
        }
    }

    pub fn kind(&self) -> EventKind {
        let (prefix, rest) = self
            .event_type
            .split_once('.')
            .unwrap_or((self.event_type.as_str(), ""));

        match prefix {
            "Intake" => EventKind::Intake,
            "Outcome" => EventKind::Outcome {
                qualifier: rest.to_string(),
            },
            _ => EventKind::Other,
        }
    }

    /// `Outcome.Adopt`, `Outcome.Adoption`, `Outcome.Adopt.Foster`, ...
    pub fn is_adoption(&self) -> bool {
        matches!(self.kind(), EventKind::Outcome { qualifier } if qualifier.starts_with("Adopt"))
    }

    pub fn timestamp(&self) -> SyncResult<i64> {
        self.time.parse()
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// An animal left out of a run because its data could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAnimal {
    pub name: String,
    pub reason: String,
}

/// One fetch worth of records plus the items that did not decode
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub records: Vec<AnimalRecord>,
    pub rejected: Vec<SkippedAnimal>,
}

impl RecordBatch {
    pub fn new(records: Vec<AnimalRecord>) -> Self {
        RecordBatch {
            records,
            rejected: Vec::new(),
        }
    }

    /// Decode raw API items one by one. An item that does not fit the record
    /// shape is kept as rejected under its name, or its internal id when the
    /// name itself is unreadable.
    pub fn decode(items: Vec<Value>) -> Self {
        let mut batch = RecordBatch::default();
        for item in items {
            let label = item_label(&item);
            match serde_json::from_value::<AnimalRecord>(item) {
                Ok(record) => batch.records.push(record),
                Err(err) => {
                    warn!(animal = %label, error = %err, "rejecting malformed record");
                    batch.rejected.push(SkippedAnimal {
                        name: label,
                        reason: SyncError::Parse(err.to_string()).to_string(),
                    });
                }
            }
        }
        batch
    }

    /// Records plus rejected items
    pub fn total(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

fn item_label(item: &Value) -> String {
    let text = |key: &str| match item.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    text("Name")
        .or_else(|| text("Internal-ID"))
        .unwrap_or_else(|| "<unnamed>".to_string())
}

/// Decode the event log of one animal. Any malformed event fails the whole
/// log, since a lost outcome would leave a custody period open.
pub fn decode_events(items: Vec<Value>, animal_id: &str) -> SyncResult<Vec<Event>> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value::<Event>(item).map_err(|err| {
                SyncError::Parse(format!("animal {}: malformed event: {}", animal_id, err))
            })
        })
        .collect()
}

// ============================================================================
// RECORD INDEX
// ============================================================================

/// Lookups over one fetched batch of records
pub struct RecordIndex {
    records: Vec<AnimalRecord>,
    by_name: HashMap<String, usize>,
    by_location: HashMap<(String, String), usize>,
}

impl RecordIndex {
    pub fn new(records: Vec<AnimalRecord>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_location = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            by_name.insert(record.name.clone(), i);
            if let Some(loc) = &record.location {
                by_location.insert((loc.tier3().to_string(), loc.tier4().to_string()), i);
            }
        }

        RecordIndex {
            records,
            by_name,
            by_location,
        }
    }

    pub fn by_name(&self, name: &str) -> Option<&AnimalRecord> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    pub fn by_location(&self, ward: &str, kennel: &str) -> Option<&AnimalRecord> {
        self.by_location
            .get(&(ward.to_string(), kennel.to_string()))
            .map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AnimalRecord] {
        &self.records
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Internal-ID": "12345",
        "ID": 987,
        "Name": "Rex",
        "Type": "Dog",
        "Status": "Available In Shelter",
        "Sex": "Male",
        "Age": 18,
        "Breed": "Labrador Retriever/Mix",
        "Size": "Large (60-99)",
        "CurrentLocation": {"Tier1": "Shelter", "Tier2": "TLAC", "Tier3": "Adoption Row", "Tier4": "Kennel 4"},
        "Attributes": [
            {"AttributeName": "Dogs: 3", "Publish": "Yes"},
            {"AttributeName": "Energy: High", "Publish": "Yes"},
            {"AttributeName": "Housetrained", "Publish": "Yes"},
            {"AttributeName": "Internal only", "Publish": "No"}
        ],
        "LastIntakeUnixTime": "1600000000"
    }"#;

    #[test]
    fn test_deserialize_api_record() {
        let record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(record.internal_id, "12345");
        assert_eq!(record.public_id, "987");
        assert_eq!(record.age_months, 18);
        assert_eq!(record.age_years(), "1.5");
        assert_eq!(record.last_intake_time().unwrap(), 1_600_000_000);
        assert_eq!(record.location_label(), "Adoption Row, Kennel 4");
    }

    #[test]
    fn test_missing_intake_is_parse_error() {
        let mut record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();
        record.last_intake = None;
        assert!(matches!(record.last_intake_time(), Err(SyncError::Parse(_))));

        record.last_intake = Some(RawTime::Text("yesterday".into()));
        assert!(matches!(record.days_since_intake(0), Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_days_since_intake_truncates() {
        let mut record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();
        record.last_intake = Some(RawTime::Number(1_000));
        let now = 1_000 + 3 * SECONDS_PER_DAY + SECONDS_PER_DAY / 2;
        assert_eq!(record.days_since_intake(now).unwrap(), 3);
    }

    #[test]
    fn test_behavior_profile_decoding() {
        let record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();
        let profile = record.behavior();

        assert_eq!(profile.dogs, Some(3));
        assert_eq!(profile.kids, None);
        assert_eq!(profile.energy, Some(EnergyLevel::High));
        assert_eq!(profile.tags, vec!["Housetrained".to_string()]);
    }

    #[test]
    fn test_out_of_range_score_is_kept_as_tag() {
        let profile = BehaviorProfile::from_attributes(&[Attribute::new("Cats: 9")]);
        assert_eq!(profile.cats, None);
        assert_eq!(profile.tags_joined(), "Cats: 9");
    }

    #[test]
    fn test_event_kind_uses_prefix_only() {
        assert_eq!(Event::new("Intake.Stray", 0).kind(), EventKind::Intake);
        assert_eq!(Event::new("Intake", 0).kind(), EventKind::Intake);
        assert_eq!(
            Event::new("Outcome.Transfer", 0).kind(),
            EventKind::Outcome {
                qualifier: "Transfer".into()
            }
        );
        assert_eq!(Event::new("Medical.Vaccine", 0).kind(), EventKind::Other);
        assert_eq!(Event::new("IntakeX.Stray", 0).kind(), EventKind::Other);
    }

    #[test]
    fn test_adoption_detection() {
        assert!(Event::new("Outcome.Adopt", 0).is_adoption());
        assert!(Event::new("Outcome.Adoption", 0).is_adoption());
        assert!(!Event::new("Outcome.ReturnToOwner", 0).is_adoption());
        assert!(!Event::new("Intake.Adopt", 0).is_adoption());
    }

    #[test]
    fn test_event_time_from_string() {
        let event: Event = serde_json::from_str(r#"{"Type": "Intake.Stray", "Time": "1700000000"}"#).unwrap();
        assert_eq!(event.timestamp().unwrap(), 1_700_000_000);

        let bad: Event = serde_json::from_str(r#"{"Type": "Intake.Stray", "Time": "soon"}"#).unwrap();
        assert!(matches!(bad.timestamp(), Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_null_missing_or_float_time_fails_at_parse() {
        for raw in [
            r#"{"Type": "Outcome.Adopt", "Time": null}"#,
            r#"{"Type": "Outcome.Adopt"}"#,
            r#"{"Type": "Outcome.Adopt", "Time": 432000.0}"#,
            r#"{"Type": "Outcome.Adopt", "Time": {"at": 5}}"#,
        ] {
            let event: Event = serde_json::from_str(raw).unwrap();
            assert!(event.is_adoption());
            assert!(matches!(event.timestamp(), Err(SyncError::Parse(_))), "{}", raw);
        }
    }

    #[test]
    fn test_days_since_intake_saturates() {
        let mut record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();
        record.last_intake = Some(RawTime::Number(i64::MIN));
        assert_eq!(record.days_since_intake(i64::MAX).unwrap(), i64::MAX / SECONDS_PER_DAY);
    }

    #[test]
    fn test_decode_events_rejects_the_whole_log() {
        let good = vec![
            serde_json::json!({"Type": "Intake.Stray", "Time": "0"}),
            serde_json::json!({"Type": "Outcome.Adopt", "Time": 432000}),
        ];
        assert_eq!(decode_events(good, "1").unwrap().len(), 2);

        let untyped = vec![
            serde_json::json!({"Type": "Intake.Stray", "Time": "0"}),
            serde_json::json!({"Time": 5}),
        ];
        match decode_events(untyped, "42") {
            Err(SyncError::Parse(message)) => assert!(message.contains("animal 42")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_record_batch_keeps_rejected_items() {
        let items = vec![
            serde_json::from_str::<Value>(SAMPLE).unwrap(),
            serde_json::json!({"Internal-ID": "1", "Name": "Max", "Type": "Dog", "Age": null}),
            serde_json::json!({"Internal-ID": 77, "Type": "Dog"}),
        ];

        let batch = RecordBatch::decode(items);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.total(), 3);
        let names: Vec<&str> = batch.rejected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Max", "77"]);
        assert!(batch.rejected[0].reason.starts_with("parse error"));
    }

    #[test]
    fn test_record_index_lookups() {
        let record: AnimalRecord = serde_json::from_str(SAMPLE).unwrap();
        let index = RecordIndex::new(vec![record]);

        assert_eq!(index.len(), 1);
        assert!(index.by_name("Rex").is_some());
        assert!(index.by_name("Fido").is_none());
        assert_eq!(
            index.by_location("Adoption Row", "Kennel 4").map(|r| r.name.as_str()),
            Some("Rex")
        );
    }
}
