// 🏷️ Eligibility Filter - Which animals count as active this sync
//
// Rules are evaluated in order and the first decisive one wins:
//   1. wrong species            -> excluded
//   2. named unlocated override -> eligible, location blanked
//   3. off-site placement       -> eligible, location normalized
//   4. on-site, available, not barn, not an excluded ward -> eligible

use crate::config::EligibilityRules;
use crate::records::{AnimalRecord, Location};
use serde::{Deserialize, Serialize};

// ============================================================================
// DECISION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    WrongSpecies,
    Unavailable,
    NoLocation,
    NotOnSite,
    Barn,
    ExcludedWard(String),
}

impl ExclusionReason {
    pub fn as_str(&self) -> &str {
        match self {
            ExclusionReason::WrongSpecies => "wrong species",
            ExclusionReason::Unavailable => "not available",
            ExclusionReason::NoLocation => "no location",
            ExclusionReason::NotOnSite => "not on site",
            ExclusionReason::Barn => "barn",
            ExclusionReason::ExcludedWard(ward) => ward,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Eligibility {
    /// Record to process, location possibly normalized
    Eligible(AnimalRecord),
    Excluded(ExclusionReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible(_))
    }
}

// ============================================================================
// FILTER
// ============================================================================

pub struct EligibilityFilter {
    rules: EligibilityRules,
}

impl EligibilityFilter {
    pub fn new(rules: EligibilityRules) -> Self {
        EligibilityFilter { rules }
    }

    pub fn rules(&self) -> &EligibilityRules {
        &self.rules
    }

    pub fn classify(&self, record: &AnimalRecord) -> Eligibility {
        let rules = &self.rules;

        if record.species != rules.species {
            return Eligibility::Excluded(ExclusionReason::WrongSpecies);
        }

        if rules.unlocated.iter().any(|name| *name == record.name) {
            let mut normalized = record.clone();
            normalized.location = Some(Location::unlocated());
            return Eligibility::Eligible(normalized);
        }

        if let Some(loc) = &record.location {
            if loc.tier2() == rules.off_site {
                let mut normalized = record.clone();
                normalized.location = Some(Location::ward(&rules.off_site_ward));
                return Eligibility::Eligible(normalized);
            }
        }

        if !rules.include_unavailable && record.status != rules.available_status {
            return Eligibility::Excluded(ExclusionReason::Unavailable);
        }

        let Some(loc) = &record.location else {
            return Eligibility::Excluded(ExclusionReason::NoLocation);
        };

        if loc.tier2() != rules.on_site {
            return Eligibility::Excluded(ExclusionReason::NotOnSite);
        }

        if loc.tier3() == rules.barn {
            return Eligibility::Excluded(ExclusionReason::Barn);
        }

        if let Some(ward) = rules
            .excluded_wards
            .iter()
            .find(|prefix| loc.tier3().starts_with(prefix.as_str()))
        {
            return Eligibility::Excluded(ExclusionReason::ExcludedWard(ward.clone()));
        }

        Eligibility::Eligible(record.clone())
    }

    /// Eligible records in input order
    pub fn select<'a, I>(&self, records: I) -> Vec<AnimalRecord>
    where
        I: IntoIterator<Item = &'a AnimalRecord>,
    {
        records
            .into_iter()
            .filter_map(|r| match self.classify(r) {
                Eligibility::Eligible(record) => Some(record),
                Eligibility::Excluded(_) => None,
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
