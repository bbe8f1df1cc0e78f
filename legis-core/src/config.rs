//! Per-section search configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, ResearchResult};
use crate::section::SectionKey;

/// Provider id of the Diet minutes search
pub const PROVIDER_KOKKAI: &str = "kokkai";
/// Provider id of the general web search
pub const PROVIDER_WEB: &str = "web";

/// Allowed providers and target result count for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTarget {
    /// Provider ids this section may query, in preference order
    pub providers: Vec<String>,
    /// Number of documents the section aims to collect
    pub target: usize,
}

impl SectionTarget {
    pub fn new(providers: &[&str], target: usize) -> Self {
        Self {
            providers: providers.iter().map(|p| p.to_string()).collect(),
            target,
        }
    }

    pub fn allows(&self, provider_id: &str) -> bool {
        self.providers.iter().any(|p| p == provider_id)
    }
}

type SectionTable = BTreeMap<SectionKey, SectionTarget>;

/// Section search table, always holding an entry for every [`SectionKey`]
///
/// Serialized as a plain `{ "<section>": {...} }` map. Deserializing layers
/// the named sections over the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SectionTable", try_from = "SectionTable")]
pub struct SectionSearchConfig {
    sections: SectionTable,
}

impl Default for SectionSearchConfig {
    fn default() -> Self {
        use SectionKey::*;

        let sections = BTreeMap::from([
            (Purpose, SectionTarget::new(&[PROVIDER_KOKKAI, PROVIDER_WEB], 5)),
            (CurrentStatus, SectionTarget::new(&[PROVIDER_WEB, PROVIDER_KOKKAI], 6)),
            (Timeline, SectionTarget::new(&[PROVIDER_KOKKAI, PROVIDER_WEB], 6)),
            (KeyPoints, SectionTarget::new(&[PROVIDER_KOKKAI, PROVIDER_WEB], 5)),
            (Background, SectionTarget::new(&[PROVIDER_WEB, PROVIDER_KOKKAI], 5)),
            (MainIssues, SectionTarget::new(&[PROVIDER_KOKKAI, PROVIDER_WEB], 6)),
            (ReasonsForChange, SectionTarget::new(&[PROVIDER_KOKKAI, PROVIDER_WEB], 5)),
            (ImpactAnalysis, SectionTarget::new(&[PROVIDER_WEB, PROVIDER_KOKKAI], 5)),
            (PastDebates, SectionTarget::new(&[PROVIDER_KOKKAI], 8)),
        ]);

        Self { sections }
    }
}

impl SectionSearchConfig {
    /// Configuration for one section
    pub fn get(&self, key: SectionKey) -> &SectionTarget {
        // Default fills all nine keys; set and overrides only replace entries.
        &self.sections[&key]
    }

    /// Replace the configuration of one section
    pub fn set(&mut self, key: SectionKey, target: SectionTarget) {
        self.sections.insert(key, target);
    }

    /// Iterate sections in report order
    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &SectionTarget)> {
        self.sections.iter().map(|(k, v)| (*k, v))
    }

    /// Apply a JSON object of `{ "<section>": {"providers": [...], "target": n} }`
    /// over the defaults. Sections not named keep their defaults.
    pub fn with_json_overrides(self, json: &str) -> ResearchResult<Self> {
        let overrides: SectionTable = serde_json::from_str(json)
            .map_err(|e| ResearchError::config(format!("Invalid section config JSON: {}", e)))?;

        self.with_overrides(overrides)
    }

    fn with_overrides(mut self, overrides: SectionTable) -> ResearchResult<Self> {
        for (key, target) in overrides {
            if target.target == 0 {
                return Err(ResearchError::config(format!(
                    "Section {} must have a target of at least 1",
                    key
                )));
            }
            self.sections.insert(key, target);
        }

        Ok(self)
    }
}

impl TryFrom<SectionTable> for SectionSearchConfig {
    type Error = ResearchError;

    fn try_from(overrides: SectionTable) -> ResearchResult<Self> {
        Self::default().with_overrides(overrides)
    }
}

impl From<SectionSearchConfig> for SectionTable {
    fn from(config: SectionSearchConfig) -> Self {
        config.sections
    }
}
