// 🎯 Scoring - Compare reconciled scores against the public scoring page
//
// The scoring page publishes four integer scores (0 = unknown) and an energy
// code letter. The working table stores the energy as a human label, so the
// label <-> code mapping lives here as one explicit table.

use crate::error::SyncResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

// ============================================================================
// ENERGY LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// (level, label, code) - the single source for both directions
const ENERGY_TABLE: [(EnergyLevel, &str, &str); 4] = [
    (EnergyLevel::Low, "Low", "L"),
    (EnergyLevel::Medium, "Medium", "M"),
    (EnergyLevel::High, "High", "H"),
    (EnergyLevel::VeryHigh, "Very High", "V"),
];

impl EnergyLevel {
    pub const ALL: [EnergyLevel; 4] = [
        EnergyLevel::Low,
        EnergyLevel::Medium,
        EnergyLevel::High,
        EnergyLevel::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        ENERGY_TABLE
            .iter()
            .find(|(level, _, _)| *level == self)
            .map(|(_, label, _)| *label)
            .unwrap_or("")
    }

    pub fn code(self) -> &'static str {
        ENERGY_TABLE
            .iter()
            .find(|(level, _, _)| *level == self)
            .map(|(_, _, code)| *code)
            .unwrap_or("")
    }

    /// Case-insensitive; unknown labels are `None`
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        ENERGY_TABLE
            .iter()
            .find(|(_, l, _)| l.eq_ignore_ascii_case(label))
            .map(|(level, _, _)| *level)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        ENERGY_TABLE
            .iter()
            .find(|(_, _, c)| c.eq_ignore_ascii_case(code))
            .map(|(level, _, _)| *level)
    }
}

/// Label for an optional level; unknown maps to the empty string
pub fn energy_label(level: Option<EnergyLevel>) -> &'static str {
    level.map(EnergyLevel::label).unwrap_or("")
}

/// Code for an optional level; unknown maps to the empty string
pub fn energy_code(level: Option<EnergyLevel>) -> &'static str {
    level.map(EnergyLevel::code).unwrap_or("")
}

// ============================================================================
// SCORE SNAPSHOT
// ============================================================================

/// Four scores (0 = unknown) plus the energy level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub dogs: u8,
    pub kids: u8,
    pub cats: u8,
    pub home: u8,
    pub energy: Option<EnergyLevel>,
}

impl ScoreSnapshot {
    pub fn unknown() -> Self {
        ScoreSnapshot::default()
    }

    pub fn is_unknown(&self) -> bool {
        *self == ScoreSnapshot::unknown()
    }
}

// ============================================================================
// MATCH STATUS
// ============================================================================

/// Value of the "Scores Match" column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreStatus {
    UpToDate,
    Mismatch,
    /// Marker a volunteer types into the working table to request a push
    UpdateRequested,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::UpToDate => "up to date",
            ScoreStatus::Mismatch => "mismatch",
            ScoreStatus::UpdateRequested => "update",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "up to date" => Some(ScoreStatus::UpToDate),
            "mismatch" => Some(ScoreStatus::Mismatch),
            "update" => Some(ScoreStatus::UpdateRequested),
            _ => None,
        }
    }
}

/// Decision for one animal: the status to write and whether to push an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDecision {
    pub status: ScoreStatus,
    pub push_update: bool,
}

/// Equal -> up to date; pending marker -> push and up to date; else mismatch
pub fn decide(
    reconciled: &ScoreSnapshot,
    published: &ScoreSnapshot,
    previous: Option<ScoreStatus>,
) -> ScoreDecision {
    if reconciled == published {
        return ScoreDecision {
            status: ScoreStatus::UpToDate,
            push_update: false,
        };
    }

    if previous == Some(ScoreStatus::UpdateRequested) {
        return ScoreDecision {
            status: ScoreStatus::UpToDate,
            push_update: true,
        };
    }

    ScoreDecision {
        status: ScoreStatus::Mismatch,
        push_update: false,
    }
}

// ============================================================================
// SCORING SOURCE
// ============================================================================

/// Looks up the published scores for one public id
pub trait ScoringSource {
    fn fetch(&self, public_id: &str) -> SyncResult<ScoreSnapshot>;
}

/// Failures are never fatal: degrade to the unknown snapshot
pub fn fetch_or_unknown(source: &dyn ScoringSource, public_id: &str) -> ScoreSnapshot {
    match source.fetch(public_id) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(public_id, error = %err, "scoring unavailable, using unknown snapshot");
            ScoreSnapshot::unknown()
        }
    }
}

/// Used when scoring comparison is disabled
pub struct NoScoring;

impl ScoringSource for NoScoring {
    fn fetch(&self, _public_id: &str) -> SyncResult<ScoreSnapshot> {
        Ok(ScoreSnapshot::unknown())
    }
}

/// Scores captured ahead of time (a JSON export of the scoring page)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StaticScoring {
    pub scores: HashMap<String, ScoreSnapshot>,
}

impl StaticScoring {
    pub fn new(scores: HashMap<String, ScoreSnapshot>) -> Self {
        StaticScoring { scores }
    }
}

impl ScoringSource for StaticScoring {
    fn fetch(&self, public_id: &str) -> SyncResult<ScoreSnapshot> {
        self.scores.get(public_id).copied().ok_or_else(|| {
            crate::error::SyncError::ScoringUnavailable(format!("no scores for {}", public_id))
        })
    }
}

// ============================================================================
// UPDATE SINK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub public_id: String,
    pub name: String,
    pub dogs: u8,
    pub kids: u8,
    pub cats: u8,
    pub home: u8,
    /// Letter code, empty when unknown
    pub energy: String,
}

impl UpdateRequest {
    pub fn new(public_id: &str, name: &str, scores: &ScoreSnapshot) -> Self {
        UpdateRequest {
            public_id: public_id.to_string(),
            name: name.to_string(),
            dogs: scores.dogs,
            kids: scores.kids,
            cats: scores.cats,
            home: scores.home,
            energy: energy_code(scores.energy).to_string(),
        }
    }
}

/// Fire-and-forget push of corrected scores; implementations log, never fail
pub trait UpdateSink {
    fn push(&self, request: &UpdateRequest);
}

pub struct LogUpdateSink;

impl UpdateSink for LogUpdateSink {
    fn push(&self, request: &UpdateRequest) {
        info!(
            public_id = %request.public_id,
            name = %request.name,
            dogs = request.dogs,
            kids = request.kids,
            cats = request.cats,
            home = request.home,
            energy = %request.energy,
            "score update requested"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::cell::RefCell;

    #[test]
    fn test_energy_label_roundtrip_is_exhaustive() {
        for level in EnergyLevel::ALL {
            assert_eq!(EnergyLevel::from_label(level.label()), Some(level));
            assert_eq!(EnergyLevel::from_code(level.code()), Some(level));
        }
    }

    #[test]
    fn test_energy_table_values() {
        assert_eq!(EnergyLevel::Low.code(), "L");
        assert_eq!(EnergyLevel::Medium.code(), "M");
        assert_eq!(EnergyLevel::High.code(), "H");
        assert_eq!(EnergyLevel::VeryHigh.code(), "V");
        assert_eq!(EnergyLevel::VeryHigh.label(), "Very High");
        assert_eq!(EnergyLevel::from_label("very high"), Some(EnergyLevel::VeryHigh));
        assert_eq!(EnergyLevel::from_code("m"), Some(EnergyLevel::Medium));
    }

    #[test]
    fn test_energy_unknown_values() {
        assert_eq!(EnergyLevel::from_label(""), None);
        assert_eq!(EnergyLevel::from_label("Couch Potato"), None);
        assert_eq!(EnergyLevel::from_code("X"), None);
        assert_eq!(energy_label(None), "");
        assert_eq!(energy_code(None), "");
    }

    #[test]
    fn test_codes_and_labels_are_unique() {
        for (i, a) in EnergyLevel::ALL.iter().enumerate() {
            for b in EnergyLevel::ALL.iter().skip(i + 1) {
                assert_ne!(a.code(), b.code());
                assert_ne!(a.label(), b.label());
            }
        }
    }

    #[test]
    fn test_score_status_strings() {
        for status in [
            ScoreStatus::UpToDate,
            ScoreStatus::Mismatch,
            ScoreStatus::UpdateRequested,
        ] {
            assert_eq!(ScoreStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ScoreStatus::parse("  Update "), Some(ScoreStatus::UpdateRequested));
        assert_eq!(ScoreStatus::parse(""), None);
    }

    fn snapshot(dogs: u8, energy: Option<EnergyLevel>) -> ScoreSnapshot {
        ScoreSnapshot {
            dogs,
            kids: 2,
            cats: 1,
            home: 3,
            energy,
        }
    }

    #[test]
    fn test_decide_equal_is_up_to_date() {
        let s = snapshot(3, Some(EnergyLevel::High));
        let d = decide(&s, &s, Some(ScoreStatus::UpdateRequested));
        assert_eq!(d.status, ScoreStatus::UpToDate);
        assert!(!d.push_update);
    }

    #[test]
    fn test_decide_pending_marker_pushes() {
        let ours = snapshot(3, Some(EnergyLevel::High));
        let theirs = snapshot(4, Some(EnergyLevel::High));
        let d = decide(&ours, &theirs, Some(ScoreStatus::UpdateRequested));
        assert_eq!(d.status, ScoreStatus::UpToDate);
        assert!(d.push_update);
    }

    #[test]
    fn test_decide_mismatch() {
        let ours = snapshot(3, Some(EnergyLevel::High));
        let theirs = snapshot(3, Some(EnergyLevel::Low));
        let d = decide(&ours, &theirs, Some(ScoreStatus::UpToDate));
        assert_eq!(d.status, ScoreStatus::Mismatch);
        assert!(!d.push_update);
        assert_eq!(decide(&ours, &theirs, None).status, ScoreStatus::Mismatch);
    }

    struct FailingScoring;

    impl ScoringSource for FailingScoring {
        fn fetch(&self, _public_id: &str) -> SyncResult<ScoreSnapshot> {
            Err(SyncError::ScoringUnavailable("page changed".into()))
        }
    }

    #[test]
    fn test_scoring_failure_degrades_to_unknown() {
        let snapshot = fetch_or_unknown(&FailingScoring, "42");
        assert!(snapshot.is_unknown());
    }

    #[test]
    fn test_static_scoring_lookup() {
        let mut scores = HashMap::new();
        scores.insert("42".to_string(), snapshot(5, None));
        let source = StaticScoring::new(scores);

        assert_eq!(fetch_or_unknown(&source, "42").dogs, 5);
        assert!(fetch_or_unknown(&source, "43").is_unknown());
    }

    struct RecordingSink(RefCell<Vec<UpdateRequest>>);

    impl UpdateSink for RecordingSink {
        fn push(&self, request: &UpdateRequest) {
            self.0.borrow_mut().push(request.clone());
        }
    }

    #[test]
    fn test_update_request_uses_energy_code() {
        let sink = RecordingSink(RefCell::new(Vec::new()));
        let request = UpdateRequest::new("42", "Rex", &snapshot(3, Some(EnergyLevel::VeryHigh)));
        sink.push(&request);
        LogUpdateSink.push(&request);

        let pushed = sink.0.borrow();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].energy, "V");
        assert_eq!(pushed[0].dogs, 3);
    }
}
