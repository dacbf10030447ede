// ⚠️ Error Kinds - What can go wrong during a sync
//
// Source and Store failures abort the sync. Parse failures are scoped to one
// animal (the engine skips it). ScoringUnavailable never escapes the scoring
// fallback; it exists so adapters can report why they fell back.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Record/event fetch failed or the API answered with a failure status
    #[error("source error: {0}")]
    Source(String),

    /// Malformed timestamp or missing required field
    #[error("parse error: {0}")]
    Parse(String),

    /// Tabular store read/write failed
    #[error("store error: {0}")]
    Store(String),

    /// Configuration file missing, unreadable or inconsistent
    #[error("config error: {0}")]
    Config(String),

    /// Scoring page could not be fetched or understood
    #[error("scoring unavailable: {0}")]
    ScoringUnavailable(String),
}

impl SyncError {
    /// Only parse errors are scoped to a single animal
    pub fn is_per_animal(&self) -> bool {
        matches!(self, SyncError::Parse(_))
    }
}

impl From<csv::Error> for SyncError {
    fn from(err: csv::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Store(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
