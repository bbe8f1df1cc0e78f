//! Document pool and evidence building

use std::collections::HashSet;

use legis_core::{
    evidence_id, DocumentResult, EvidenceRecord, SectionDocuments, SectionHints,
    SectionSearchOutcome,
};

/// Documents gathered during a run, in arrival order, with their section hints
#[derive(Debug, Clone, Default)]
pub struct DocumentPool {
    documents: Vec<DocumentResult>,
    hints: SectionHints,
}

impl DocumentPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[DocumentResult] {
        &self.documents
    }

    pub fn hints(&self) -> &SectionHints {
        &self.hints
    }

    /// Append section-keyed documents, recording the section as a hint
    pub fn extend_sections(&mut self, sections: Vec<SectionDocuments>) {
        for SectionDocuments {
            section_key,
            documents,
        } in sections
        {
            for document in documents {
                self.hints
                    .entry(document.dedup_key())
                    .or_default()
                    .insert(section_key);
                self.documents.push(document);
            }
        }
    }

    /// Number each distinct document. See [`build_evidence`].
    pub fn build_evidence(&self) -> Vec<EvidenceRecord> {
        build_evidence(&self.documents, &self.hints)
    }
}

impl From<SectionSearchOutcome> for DocumentPool {
    fn from(outcome: SectionSearchOutcome) -> Self {
        Self {
            documents: outcome.documents,
            hints: outcome.section_hints,
        }
    }
}

/// Deduplicate `documents` and assign `e1, e2, ...` in first-occurrence order.
///
/// Later documents with an already seen dedup key are dropped without touching
/// the first record. Hint sets come from `hints` by dedup key and are left out
/// when empty. The output depends only on the input order.
pub fn build_evidence(documents: &[DocumentResult], hints: &SectionHints) -> Vec<EvidenceRecord> {
    let mut seen = HashSet::with_capacity(documents.len());
    let mut evidence = Vec::new();

    for document in documents {
        let key = document.dedup_key();
        if !seen.insert(key.clone()) {
            continue;
        }

        let section_hints = hints.get(&key).filter(|h| !h.is_empty()).cloned();

        evidence.push(EvidenceRecord {
            id: evidence_id(evidence.len() + 1),
            section_hints,
            url: document.url.clone(),
            title: document.title.clone(),
            content: document.content.clone(),
            score: document.score,
            source: document.source.clone(),
            extras: document.extras.clone(),
        });
    }

    evidence
}
