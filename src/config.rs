// ⚙️ Sync Configuration - Everything the engine needs, passed in explicitly
//
// Loaded from a JSON file (every field has a default) and handed to the
// engine at construction time. Nothing here is process-wide state.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// ELIGIBILITY RULES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityRules {
    /// Only this species is synced
    pub species: String,

    /// Status value meaning "on the adoption floor"
    pub available_status: String,

    /// Tier2 value of the main facility
    pub on_site: String,

    /// Tier2 value of animals placed outside the facility
    pub off_site: String,

    /// Tier3 written for off-site animals
    pub off_site_ward: String,

    /// Tier3 value that is never synced
    pub barn: String,

    /// Tier3 prefixes of wards that are never synced
    pub excluded_wards: Vec<String>,

    /// Animals always synced with an empty location
    pub unlocated: Vec<String>,

    pub include_unavailable: bool,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        EligibilityRules {
            species: "Dog".to_string(),
            available_status: "Available In Shelter".to_string(),
            on_site: "TLAC".to_string(),
            off_site: "Off Site".to_string(),
            off_site_ward: "Off Site".to_string(),
            barn: "Barn".to_string(),
            excluded_wards: vec![
                "Medical".to_string(),
                "Parvo".to_string(),
                "Maternity".to_string(),
            ],
            unlocated: Vec::new(),
            include_unavailable: false,
        }
    }
}

// ============================================================================
// TABLE SPECS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table (sheet) name in the store
    pub name: String,

    /// Column whose value identifies a row
    pub key_column: String,

    /// Rows above the header that belong to someone else (titles, notes)
    #[serde(default)]
    pub header_offset: usize,
}

impl TableSpec {
    pub fn new(name: &str, key_column: &str) -> Self {
        TableSpec {
            name: name.to_string(),
            key_column: key_column.to_string(),
            header_offset: 0,
        }
    }
}

// ============================================================================
// SYNC CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub eligibility: EligibilityRules,

    pub working: TableSpec,
    pub archive: TableSpec,
    pub legacy: TableSpec,

    /// Compare reconciled scores against the scoring source
    pub compare_scores: bool,

    /// Shelter API root, e.g. https://www.shelterluv.com/api/v1
    pub api_base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Endpoint receiving score corrections; log-only when unset
    pub update_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            eligibility: EligibilityRules::default(),
            working: TableSpec::new("Dogs", "Name"),
            archive: TableSpec::new("Archive", "Name"),
            legacy: TableSpec::new("Original", "Dog Name"),
            compare_scores: true,
            api_base_url: "https://www.shelterluv.com/api/v1".to_string(),
            api_key_env: "SHELTERLUV_KEY".to_string(),
            update_url: None,
        }
    }
}

impl SyncConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            SyncError::Config(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;

        let config: SyncConfig = serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.eligibility.species.trim().is_empty() {
            return Err(SyncError::Config("eligibility.species must not be empty".into()));
        }

        for spec in [&self.working, &self.archive, &self.legacy] {
            if spec.name.trim().is_empty() {
                return Err(SyncError::Config("table name must not be empty".into()));
            }
            if spec.key_column.trim().is_empty() {
                return Err(SyncError::Config(format!(
                    "table {} has an empty key column",
                    spec.name
                )));
            }
        }

        if self.working.name == self.archive.name
            || self.working.name == self.legacy.name
            || self.archive.name == self.legacy.name
        {
            return Err(SyncError::Config(
                "working, archive and legacy tables must be distinct".into(),
            ));
        }

        Ok(())
    }

    pub fn with_include_unavailable(mut self, include: bool) -> Self {
        self.eligibility.include_unavailable = include;
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.eligibility.on_site, "TLAC");
        assert_eq!(config.working.key_column, "Name");
        assert_eq!(config.legacy.key_column, "Dog Name");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"eligibility": {{"unlocated": ["Houdini"]}}, "compare_scores": false}}"#
        )
        .unwrap();

        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.eligibility.unlocated, vec!["Houdini".to_string()]);
        assert_eq!(config.eligibility.species, "Dog");
        assert!(!config.compare_scores);
        assert_eq!(config.archive.name, "Archive");
    }

    #[test]
    fn test_duplicate_tables_rejected() {
        let mut config = SyncConfig::default();
        config.archive.name = config.working.name.clone();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_empty_key_column_rejected() {
        let mut config = SyncConfig::default();
        config.legacy.key_column = " ".to_string();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = SyncConfig::from_file("/nonexistent/shelter-sync.json");
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}
