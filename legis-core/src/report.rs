//! The assembled research artifact

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::document::EvidenceRecord;
use crate::section::SectionKey;

/// Summary text placed in every section when no evidence was found
pub const NO_RESULTS_SUMMARY: &str = "No relevant information was found for this query.";

/// Synthesized summary for one section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionSummary {
    #[serde(default)]
    pub summary: String,
    /// Evidence ids (`e<N>`) backing the summary
    #[serde(default)]
    pub citations: Vec<String>,
}

impl SectionSummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            citations: Vec::new(),
        }
    }
}

/// Per-section synthesized content
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeepResearchSections {
    #[serde(default)]
    pub purpose: SectionSummary,
    #[serde(default)]
    pub current_status: SectionSummary,
    #[serde(default)]
    pub timeline: SectionSummary,
    #[serde(default)]
    pub key_points: SectionSummary,
    #[serde(default)]
    pub background: SectionSummary,
    #[serde(default)]
    pub main_issues: SectionSummary,
    #[serde(default)]
    pub reasons_for_change: SectionSummary,
    #[serde(default)]
    pub impact_analysis: SectionSummary,
    #[serde(default)]
    pub past_debates: SectionSummary,
}

impl DeepResearchSections {
    /// Every section carrying the same summary and no citations
    pub fn uniform(summary: &str) -> Self {
        let mut sections = Self::default();
        for key in SectionKey::ALL {
            *sections.get_mut(key) = SectionSummary::new(summary);
        }
        sections
    }

    pub fn get(&self, key: SectionKey) -> &SectionSummary {
        match key {
            SectionKey::Purpose => &self.purpose,
            SectionKey::CurrentStatus => &self.current_status,
            SectionKey::Timeline => &self.timeline,
            SectionKey::KeyPoints => &self.key_points,
            SectionKey::Background => &self.background,
            SectionKey::MainIssues => &self.main_issues,
            SectionKey::ReasonsForChange => &self.reasons_for_change,
            SectionKey::ImpactAnalysis => &self.impact_analysis,
            SectionKey::PastDebates => &self.past_debates,
        }
    }

    pub fn get_mut(&mut self, key: SectionKey) -> &mut SectionSummary {
        match key {
            SectionKey::Purpose => &mut self.purpose,
            SectionKey::CurrentStatus => &mut self.current_status,
            SectionKey::Timeline => &mut self.timeline,
            SectionKey::KeyPoints => &mut self.key_points,
            SectionKey::Background => &mut self.background,
            SectionKey::MainIssues => &mut self.main_issues,
            SectionKey::ReasonsForChange => &mut self.reasons_for_change,
            SectionKey::ImpactAnalysis => &mut self.impact_analysis,
            SectionKey::PastDebates => &mut self.past_debates,
        }
    }

    /// Drop citations that reference no known evidence id and collapse repeats.
    ///
    /// Returns the dropped citations as `(section, citation)` pairs.
    pub fn retain_known_citations(
        &mut self,
        evidence: &[EvidenceRecord],
    ) -> Vec<(SectionKey, String)> {
        let known: HashSet<&str> = evidence.iter().map(|e| e.id.as_str()).collect();
        let mut dropped = Vec::new();

        for key in SectionKey::ALL {
            let section = self.get_mut(key);
            let mut seen = HashSet::new();
            let mut kept = Vec::with_capacity(section.citations.len());
            for citation in section.citations.drain(..) {
                if !known.contains(citation.as_str()) {
                    dropped.push((key, citation));
                } else if seen.insert(citation.clone()) {
                    kept.push(citation);
                }
            }
            section.citations = kept;
        }

        dropped
    }
}

/// Run metadata attached to a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchMetadata {
    pub run_id: String,
    pub providers_used: Vec<String>,
    pub iterations: u32,
    pub total_results: usize,
    #[serde(default)]
    pub subqueries: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    pub generated_at: DateTime<Utc>,
}

/// Final artifact of a research run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepResearchResponse {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of_date: Option<NaiveDate>,
    pub sections: DeepResearchSections,
    pub evidence: Vec<EvidenceRecord>,
    pub metadata: ResearchMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentSource, ProviderType};

    fn record(id: &str) -> EvidenceRecord {
        EvidenceRecord {
            id: id.to_string(),
            section_hints: None,
            url: None,
            title: String::new(),
            content: String::new(),
            score: None,
            source: DocumentSource::new("web", ProviderType::Web),
            extras: None,
        }
    }

    #[test]
    fn test_sections_parse_with_missing_fields() {
        let sections: DeepResearchSections = serde_json::from_str(
            r#"{"purpose": {"summary": "Raise the rate", "citations": ["e1"]}}"#,
        )
        .unwrap();
        assert_eq!(sections.purpose.citations, vec!["e1"]);
        assert!(sections.past_debates.summary.is_empty());
    }

    #[test]
    fn test_uniform_fills_every_section() {
        let sections = DeepResearchSections::uniform(NO_RESULTS_SUMMARY);
        for key in SectionKey::ALL {
            assert_eq!(sections.get(key).summary, NO_RESULTS_SUMMARY);
            assert!(sections.get(key).citations.is_empty());
        }
    }

    #[test]
    fn test_retain_known_citations() {
        let mut sections = DeepResearchSections::default();
        sections.timeline.citations = vec!["e2".into(), "e9".into(), "e2".into(), "e1".into()];

        let dropped = sections.retain_known_citations(&[record("e1"), record("e2")]);

        assert_eq!(sections.timeline.citations, vec!["e2", "e1"]);
        assert_eq!(dropped, vec![(SectionKey::Timeline, "e9".to_string())]);
    }
}
