//! Core types for the legislative deep research pipeline
//!
//! This crate defines the shared data structures used across the workspace:
//! requests, documents, evidence, progress events, the final report, and the
//! contracts of the collaborators the pipeline delegates to.

pub mod collaborators;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod progress;
pub mod report;
pub mod request;
pub mod section;

pub use collaborators::{
    AttachmentExtractor, QueryPlanner, SearchProvider, SectionCompleteFn, SectionDocuments,
    SectionHints, SectionSearch, SectionSearchOutcome, SectionSearchParams, Synthesizer,
    TextStream,
};
pub use config::{SectionSearchConfig, SectionTarget, PROVIDER_KOKKAI, PROVIDER_WEB};
pub use document::{evidence_id, DocumentResult, DocumentSource, EvidenceRecord, ProviderType};
pub use error::{ResearchError, ResearchResult};
pub use event::{ProgressEvent, SectionProgress, EVENT_TYPES};
pub use progress::ProgressSink;
pub use report::{
    DeepResearchResponse, DeepResearchSections, ResearchMetadata, SectionSummary,
    NO_RESULTS_SUMMARY,
};
pub use request::{Attachment, QueryPlan, ResearchRequest};
pub use section::SectionKey;
