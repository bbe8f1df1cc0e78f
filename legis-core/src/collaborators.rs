//! Contracts of the collaborators the research pipeline delegates to

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::SectionSearchConfig;
use crate::document::{DocumentResult, EvidenceRecord, ProviderType};
use crate::error::ResearchResult;
use crate::request::QueryPlan;
use crate::section::SectionKey;

/// Incremental synthesis output: ordered, finite, not restartable
pub type TextStream = BoxStream<'static, ResearchResult<String>>;

/// Callback invoked once per finished section. May borrow from the caller.
pub type SectionCompleteFn<'a> = dyn Fn(SectionKey) + Send + Sync + 'a;

/// Dedup key -> sections that surfaced it
pub type SectionHints = HashMap<String, BTreeSet<SectionKey>>;

/// Turns a free-text query into subqueries and entities
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, query: &str) -> ResearchResult<QueryPlan>;
}

/// A single search backend
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Identifier used in allow-lists and requests
    fn id(&self) -> &str;

    fn provider_type(&self) -> ProviderType;

    async fn search(&self, query: &str, limit: usize) -> ResearchResult<Vec<DocumentResult>>;
}

/// Inputs of a section search run
pub struct SectionSearchParams<'a> {
    pub subqueries: &'a [String],
    pub providers: &'a [Arc<dyn SearchProvider>],
    pub sections: &'a SectionSearchConfig,
    /// Overall cap on merged documents
    pub limit: usize,
}

/// Result of a section search run
#[derive(Debug, Clone, Default)]
pub struct SectionSearchOutcome {
    pub documents: Vec<DocumentResult>,
    pub section_hints: SectionHints,
    /// Reporting only
    pub iterations: u32,
}

/// Runs one search per section, concurrently, and merges the results
#[async_trait]
pub trait SectionSearch: Send + Sync {
    async fn search_sections(
        &self,
        params: SectionSearchParams<'_>,
        on_section_complete: &SectionCompleteFn<'_>,
    ) -> ResearchResult<SectionSearchOutcome>;
}

/// Documents an extractor assigned to one section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDocuments {
    pub section_key: SectionKey,
    #[serde(default)]
    pub documents: Vec<DocumentResult>,
}

/// Splits an attachment into section-keyed documents
#[async_trait]
pub trait AttachmentExtractor: Send + Sync {
    async fn extract(
        &self,
        query: &str,
        file_name: &str,
        bytes: &[u8],
        media_type: &str,
    ) -> ResearchResult<Vec<SectionDocuments>>;
}

/// Produces the sections payload as an incremental text stream
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        query: &str,
        as_of_date: Option<NaiveDate>,
        evidence: &[EvidenceRecord],
    ) -> ResearchResult<TextStream>;
}
