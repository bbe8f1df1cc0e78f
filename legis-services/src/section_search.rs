//! Default section search: one concurrent search per report section

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use legis_core::{
    DocumentResult, ProviderType, ResearchResult, SearchProvider, SectionCompleteFn, SectionKey,
    SectionSearch, SectionSearchOutcome, SectionSearchParams, SectionTarget,
};
use tracing::{debug, info, instrument, warn};

/// Documents collected for one section
#[derive(Debug)]
struct SectionRun {
    section: SectionKey,
    documents: Vec<DocumentResult>,
    iterations: u32,
}

/// Searches all sections concurrently.
///
/// Each section walks the subqueries in order, one iteration per subquery,
/// querying every allowed provider until the section target is reached. A
/// provider failure counts as an empty result.
#[derive(Debug, Clone, Default)]
pub struct ConcurrentSectionSearch;

impl ConcurrentSectionSearch {
    pub fn new() -> Self {
        Self
    }
}

/// Query sent to a provider for a section. Web search gets the section's focus
/// terms appended; legislative full-text search gets the bare subquery.
fn section_query(section: SectionKey, subquery: &str, provider_type: ProviderType) -> String {
    match provider_type {
        ProviderType::Web => format!("{} {}", subquery, section.search_focus()),
        ProviderType::Legislative | ProviderType::Attachment => subquery.to_string(),
    }
}

async fn search_provider(
    provider: &Arc<dyn SearchProvider>,
    section: SectionKey,
    subquery: &str,
    limit: usize,
) -> Vec<DocumentResult> {
    let query = section_query(section, subquery, provider.provider_type());
    match provider.search(&query, limit).await {
        Ok(documents) => documents,
        Err(e) => {
            warn!(
                "Provider {} failed for section {}: {}",
                provider.id(),
                section,
                e
            );
            Vec::new()
        }
    }
}

async fn search_section(
    section: SectionKey,
    target: &SectionTarget,
    subqueries: &[String],
    providers: &[Arc<dyn SearchProvider>],
) -> SectionRun {
    // Allowed providers in the section's preference order
    let allowed: Vec<&Arc<dyn SearchProvider>> = target
        .providers
        .iter()
        .filter_map(|id| providers.iter().find(|p| p.id() == id))
        .collect();

    let mut run = SectionRun {
        section,
        documents: Vec::new(),
        iterations: 0,
    };

    if allowed.is_empty() || target.target == 0 {
        debug!("Section {} has no usable providers", section);
        return run;
    }

    let mut seen = HashSet::new();
    for subquery in subqueries {
        if run.documents.len() >= target.target {
            break;
        }
        run.iterations += 1;

        let remaining = target.target - run.documents.len();
        let batches = join_all(
            allowed
                .iter()
                .map(|provider| search_provider(provider, section, subquery, remaining)),
        )
        .await;

        for document in batches.into_iter().flatten() {
            if run.documents.len() >= target.target {
                break;
            }
            if seen.insert(document.dedup_key()) {
                run.documents.push(document);
            }
        }
    }

    debug!(
        "Section {} collected {}/{} documents in {} iterations",
        section,
        run.documents.len(),
        target.target,
        run.iterations
    );

    run
}

/// Merge section runs in report order. First occurrence wins, hints are
/// unioned, and at most `limit` distinct documents are kept.
fn merge_runs(mut runs: Vec<SectionRun>, limit: usize) -> SectionSearchOutcome {
    runs.sort_by_key(|run| run.section);

    let mut outcome = SectionSearchOutcome::default();
    let mut seen = HashSet::new();

    for run in runs {
        outcome.iterations = outcome.iterations.max(run.iterations);
        for document in run.documents {
            let key = document.dedup_key();
            outcome
                .section_hints
                .entry(key.clone())
                .or_default()
                .insert(run.section);
            if outcome.documents.len() < limit && seen.insert(key) {
                outcome.documents.push(document);
            }
        }
    }

    outcome
}

#[async_trait]
impl SectionSearch for ConcurrentSectionSearch {
    #[instrument(skip_all, fields(subqueries = params.subqueries.len(), limit = params.limit))]
    async fn search_sections(
        &self,
        params: SectionSearchParams<'_>,
        on_section_complete: &SectionCompleteFn<'_>,
    ) -> ResearchResult<SectionSearchOutcome> {
        let params = &params;

        let runs = join_all(SectionKey::ALL.iter().map(|&section| async move {
            let run = search_section(
                section,
                params.sections.get(section),
                params.subqueries,
                params.providers,
            )
            .await;
            on_section_complete(section);
            run
        }))
        .await;

        let outcome = merge_runs(runs, params.limit);
        info!(
            "Section search merged {} documents ({} distinct keys, {} iterations)",
            outcome.documents.len(),
            outcome.section_hints.len(),
            outcome.iterations
        );

        Ok(outcome)
    }
}
