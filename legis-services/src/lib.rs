//! Service layer for legislative deep research
//!
//! This crate runs the research pipeline: it plans the query, searches every
//! report section concurrently, folds in attachment extracts, numbers the
//! evidence and streams the synthesized report, reporting progress on a
//! single ordered channel.

pub mod attachments;
pub mod config;
pub mod evidence;
pub mod progress_channel;
pub mod provider_registry;
pub mod research_service;
pub mod section_search;
pub mod steps;
pub mod synthesis;

pub use attachments::{extract_attachments, extraction_query};
pub use config::ResearchConfig;
pub use evidence::{build_evidence, DocumentPool};
pub use progress_channel::{ProgressChannel, DEFAULT_DELIVERY_TIMEOUT};
pub use provider_registry::ProviderRegistry;
pub use research_service::DeepResearchService;
pub use section_search::ConcurrentSectionSearch;
pub use steps::{total_steps, PipelineStep, StepTracker};
pub use synthesis::{consume_synthesis, parse_sections, SynthesisOutput};
