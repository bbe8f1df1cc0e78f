//! Deep research service
//!
//! Sequences planning, section search, optional attachment extraction,
//! evidence building and synthesis for one request, reporting progress on a
//! single ordered channel. Every run ends with exactly one `complete` or
//! `error` event.

use std::sync::Arc;

use chrono::Utc;
use legis_core::{
    AttachmentExtractor, DeepResearchResponse, DeepResearchSections, EvidenceRecord, ProgressEvent,
    ProgressSink, QueryPlan, QueryPlanner, ResearchError, ResearchMetadata, ResearchRequest,
    ResearchResult, SearchProvider, SectionKey, SectionProgress, SectionSearch,
    SectionSearchParams, Synthesizer, NO_RESULTS_SUMMARY,
};
use legis_research::OpenAIClient;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::attachments::extract_attachments;
use crate::config::ResearchConfig;
use crate::evidence::DocumentPool;
use crate::progress_channel::ProgressChannel;
use crate::provider_registry::ProviderRegistry;
use crate::section_search::ConcurrentSectionSearch;
use crate::steps::{PipelineStep, StepTracker};
use crate::synthesis::consume_synthesis;

/// Facts about a run gathered on the way to the final report
struct RunSummary {
    plan: QueryPlan,
    subqueries: Vec<String>,
    providers_used: Vec<String>,
    iterations: u32,
}

/// Service running the legislative deep research pipeline
pub struct DeepResearchService {
    planner: Arc<dyn QueryPlanner>,
    registry: ProviderRegistry,
    section_search: Arc<dyn SectionSearch>,
    extractor: Option<Arc<dyn AttachmentExtractor>>,
    synthesizer: Arc<dyn Synthesizer>,
    config: ResearchConfig,
}

impl DeepResearchService {
    /// Create a service using the concurrent section search and no attachment extractor
    pub fn new(
        planner: Arc<dyn QueryPlanner>,
        registry: ProviderRegistry,
        synthesizer: Arc<dyn Synthesizer>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            planner,
            registry,
            section_search: Arc::new(ConcurrentSectionSearch::new()),
            extractor: None,
            synthesizer,
            config,
        }
    }

    pub fn with_section_search(mut self, section_search: Arc<dyn SectionSearch>) -> Self {
        self.section_search = section_search;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn AttachmentExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Create a service from environment variables
    ///
    /// Requires OPENAI_API_KEY. EXA_API_KEY enables web search.
    pub fn from_env() -> ResearchResult<Self> {
        let openai = Arc::new(OpenAIClient::new()?);
        let registry = ProviderRegistry::from_env()?;
        let config = ResearchConfig::from_env()?;

        Ok(Self::new(openai.clone(), registry, openai.clone(), config).with_extractor(openai))
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run the pipeline for `request`, reporting progress to `sink` if given.
    ///
    /// The sink receives exactly one terminal event. Sink failures are logged
    /// and never affect the result.
    #[instrument(skip_all, fields(query = %request.query, attachments = request.attachments.len()))]
    pub async fn run(
        &self,
        request: &ResearchRequest,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> ResearchResult<DeepResearchResponse> {
        let channel =
            ProgressChannel::new(sink).with_delivery_timeout(self.config.progress_timeout);
        let mut tracker = StepTracker::new(request.has_attachments());

        let result = self.run_pipeline(request, &channel, &mut tracker).await;

        let terminal = match &result {
            Ok(response) => {
                info!(
                    "Research complete: {} evidence records",
                    response.evidence.len()
                );
                ProgressEvent::Complete {
                    result: Box::new(response.clone()),
                }
            }
            Err(e) => {
                error!("Research failed at step {} ({}): {}", tracker.number(), tracker.name(), e);
                tracker.error_event(e)
            }
        };

        emit(&channel, terminal).await;
        channel.close().await;

        result
    }

    async fn run_pipeline(
        &self,
        request: &ResearchRequest,
        channel: &ProgressChannel,
        tracker: &mut StepTracker,
    ) -> ResearchResult<DeepResearchResponse> {
        // Planning
        tracker.enter(PipelineStep::Planning);
        emit(
            channel,
            tracker.progress_event(Some("Breaking the query into subqueries".to_string()), None),
        )
        .await;

        let query = request.query.trim();
        if query.is_empty() {
            return Err(ResearchError::invalid_request("query must not be empty"));
        }

        let plan = self.planner.plan(query).await?;
        let subqueries = self.subqueries(query, &plan)?;
        info!("Planned {} subqueries", subqueries.len());

        // Section search
        tracker.enter(PipelineStep::SectionSearch);
        let providers = self.resolve_providers(request)?;
        let limit = self.config.effective_limit(request.limit);
        emit(
            channel,
            tracker.progress_event(
                Some(format!(
                    "Searching {} sections with {} providers",
                    SectionKey::COUNT,
                    providers.len()
                )),
                Some(SectionProgress {
                    completed: 0,
                    total: SectionKey::COUNT,
                }),
            ),
        )
        .await;

        let search_step = tracker.clone();
        let completed = Mutex::new(0usize);
        let on_section_complete = |section: SectionKey| {
            // Held while queueing so delivered counts never go backwards
            let mut completed = completed.lock();
            *completed += 1;
            channel.send(search_step.progress_event(
                Some(format!("Finished section: {}", section.display_name())),
                Some(SectionProgress {
                    completed: *completed,
                    total: SectionKey::COUNT,
                }),
            ));
        };

        let outcome = self
            .section_search
            .search_sections(
                SectionSearchParams {
                    subqueries: &subqueries,
                    providers: &providers,
                    sections: &self.config.sections,
                    limit,
                },
                &on_section_complete,
            )
            .await?;

        let summary = RunSummary {
            plan,
            subqueries,
            providers_used: providers.iter().map(|p| p.id().to_string()).collect(),
            iterations: outcome.iterations,
        };
        let mut pool = DocumentPool::from(outcome);
        info!("Section search returned {} documents", pool.len());

        // Attachment extraction
        if request.has_attachments() {
            tracker.enter(PipelineStep::AttachmentExtraction);
            emit(
                channel,
                tracker.progress_event(
                    Some(format!(
                        "Extracting sections from {} attachment(s)",
                        request.attachments.len()
                    )),
                    None,
                ),
            )
            .await;

            let extractor = self.extractor.as_deref().ok_or_else(|| {
                ResearchError::extraction("no attachment extractor is configured")
            })?;
            let sections =
                extract_attachments(extractor, query, &summary.subqueries, &request.attachments)
                    .await?;
            pool.extend_sections(sections);
        }

        // Evidence
        tracker.enter(PipelineStep::EvidenceBuild);
        emit(
            channel,
            tracker.progress_event(
                Some(format!("Building evidence from {} documents", pool.len())),
                None,
            ),
        )
        .await;

        let evidence = pool.build_evidence();
        info!("Built {} evidence records", evidence.len());

        if evidence.is_empty() {
            info!("No evidence found; skipping synthesis");
            return Ok(self.response(
                request,
                DeepResearchSections::uniform(NO_RESULTS_SUMMARY),
                evidence,
                summary,
            ));
        }

        // Synthesis
        tracker.enter(PipelineStep::Synthesis);
        emit(
            channel,
            tracker.progress_event(
                Some(format!(
                    "Synthesizing report from {} evidence records",
                    evidence.len()
                )),
                None,
            ),
        )
        .await;

        let stream = self
            .synthesizer
            .synthesize(query, request.as_of_date, &evidence)
            .await
            .map_err(|e| match e {
                ResearchError::Synthesis(_) => e,
                other => ResearchError::synthesis(other.to_string()),
            })?;
        let mut sections = consume_synthesis(stream, channel).await?.sections;

        for (section, citation) in sections.retain_known_citations(&evidence) {
            warn!("Dropped unknown citation {} in section {}", citation, section);
        }

        Ok(self.response(request, sections, evidence, summary))
    }

    /// Subqueries to search, falling back to the query itself when allowed
    fn subqueries(&self, query: &str, plan: &QueryPlan) -> ResearchResult<Vec<String>> {
        let subqueries = plan.effective_subqueries();
        if !subqueries.is_empty() {
            return Ok(subqueries);
        }

        if self.config.subquery_fallback {
            debug!("Planner returned no subqueries; searching the query itself");
            Ok(vec![query.to_string()])
        } else {
            Err(ResearchError::planning("planner returned no subqueries"))
        }
    }

    /// Providers named by the request, else the configured defaults, else all registered
    fn resolve_providers(
        &self,
        request: &ResearchRequest,
    ) -> ResearchResult<Vec<Arc<dyn SearchProvider>>> {
        let ids = match &request.providers {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ if !self.config.default_providers.is_empty() => self.config.default_providers.clone(),
            _ => self.registry.ids(),
        };
        self.registry.resolve(&ids)
    }

    fn response(
        &self,
        request: &ResearchRequest,
        sections: DeepResearchSections,
        evidence: Vec<EvidenceRecord>,
        summary: RunSummary,
    ) -> DeepResearchResponse {
        let metadata = ResearchMetadata {
            run_id: Uuid::new_v4().to_string(),
            providers_used: summary.providers_used,
            iterations: summary.iterations,
            total_results: evidence.len(),
            subqueries: summary.subqueries,
            entities: summary.plan.entities,
            confidence: summary.plan.confidence,
            generated_at: Utc::now(),
        };

        DeepResearchResponse {
            query: request.query.clone(),
            as_of_date: request.as_of_date,
            sections,
            evidence,
            metadata,
        }
    }
}

/// Emit a stage-boundary event, waiting for delivery up to the channel's
/// timeout. Failures are only logged.
async fn emit(channel: &ProgressChannel, event: ProgressEvent) {
    if let Err(e) = channel.emit(event).await {
        debug!("Progress event not delivered: {}", e);
    }
}
