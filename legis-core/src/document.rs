//! Retrieved documents and the evidence records derived from them

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::section::SectionKey;

/// Kind of backend a provider talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Official legislative records (minutes, bills)
    Legislative,
    /// General web search
    Web,
    /// Content extracted from a user-supplied attachment
    Attachment,
}

/// Where a document came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSource {
    pub provider_id: String,
    pub provider_type: ProviderType,
}

impl DocumentSource {
    pub fn new(provider_id: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_type,
        }
    }
}

/// A retrieved unit of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    /// Provider-scoped identifier
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source: DocumentSource,
    /// Free-form extras (page number, matched keywords, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
}

impl DocumentResult {
    /// Canonical key used to decide whether two documents are the same item.
    ///
    /// The URL when present and non-empty, otherwise `providerId:id`.
    pub fn dedup_key(&self) -> String {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}:{}", self.source.provider_id, self.id),
        }
    }
}

/// A deduplicated, globally numbered view of a [`DocumentResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// `e1`, `e2`, ... in first-occurrence order
    pub id: String,
    /// Sections whose searches surfaced this document. Absent when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_hints: Option<BTreeSet<SectionKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source: DocumentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Format the evidence id for a 1-based sequence number
pub fn evidence_id(n: usize) -> String {
    format!("e{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, url: Option<&str>) -> DocumentResult {
        DocumentResult {
            id: id.to_string(),
            url: url.map(String::from),
            title: "t".to_string(),
            content: "c".to_string(),
            score: None,
            source: DocumentSource::new("kokkai", ProviderType::Legislative),
            extras: None,
        }
    }

    #[test]
    fn test_dedup_key_prefers_url() {
        assert_eq!(doc("1", Some("https://a.example")).dedup_key(), "https://a.example");
    }

    #[test]
    fn test_dedup_key_falls_back_to_provider_and_id() {
        assert_eq!(doc("42", None).dedup_key(), "kokkai:42");
        assert_eq!(doc("42", Some("  ")).dedup_key(), "kokkai:42");
    }

    #[test]
    fn test_evidence_omits_empty_fields_on_wire() {
        let record = EvidenceRecord {
            id: evidence_id(1),
            section_hints: None,
            url: None,
            title: "t".to_string(),
            content: "c".to_string(),
            score: None,
            source: DocumentSource::new("web", ProviderType::Web),
            extras: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "e1");
        assert!(json.get("sectionHints").is_none());
        assert_eq!(json["source"]["providerType"], "web");
    }
}
