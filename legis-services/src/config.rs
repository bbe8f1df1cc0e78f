//! Research service configuration

use std::time::Duration;

use legis_core::{ResearchError, ResearchResult, SectionSearchConfig};

use crate::progress_channel::DEFAULT_DELIVERY_TIMEOUT;

/// Configuration for DeepResearchService
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    /// Providers used when a request names none. Empty means every registered provider.
    pub default_providers: Vec<String>,
    /// Result limit used when a request sets none
    pub default_limit: usize,
    /// Upper bound for any requested limit
    pub max_limit: usize,
    /// Use the raw query as the only subquery when the planner returns none
    pub subquery_fallback: bool,
    /// Per-section provider allow-lists and targets
    pub sections: SectionSearchConfig,
    /// How long a stage-boundary event may wait on the progress sink
    pub progress_timeout: Duration,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            default_providers: Vec::new(),
            default_limit: 50,
            max_limit: 200,
            subquery_fallback: true,
            sections: SectionSearchConfig::default(),
            progress_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

impl ResearchConfig {
    /// Load configuration from environment variables
    ///
    /// Reads (all optional):
    /// - RESEARCH_DEFAULT_PROVIDERS: comma separated provider ids
    /// - RESEARCH_RESULT_LIMIT: default result limit
    /// - RESEARCH_SUBQUERY_FALLBACK: "true" / "false"
    /// - RESEARCH_PROGRESS_TIMEOUT_MS: progress delivery timeout in milliseconds
    /// - SECTION_SEARCH_CONFIG: JSON overrides of the section table
    pub fn from_env() -> ResearchResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(get: F) -> ResearchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(providers) = get("RESEARCH_DEFAULT_PROVIDERS") {
            config.default_providers = providers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(limit) = get("RESEARCH_RESULT_LIMIT") {
            let limit: usize = limit.trim().parse().map_err(|_| {
                ResearchError::config(format!("RESEARCH_RESULT_LIMIT is not a number: {}", limit))
            })?;
            if limit == 0 {
                return Err(ResearchError::config("RESEARCH_RESULT_LIMIT must be at least 1"));
            }
            config.default_limit = limit.min(config.max_limit);
        }

        if let Some(fallback) = get("RESEARCH_SUBQUERY_FALLBACK") {
            config.subquery_fallback = match fallback.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(ResearchError::config(format!(
                        "RESEARCH_SUBQUERY_FALLBACK must be true or false, got {}",
                        other
                    )))
                }
            };
        }

        if let Some(ms) = get("RESEARCH_PROGRESS_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                ResearchError::config(format!("RESEARCH_PROGRESS_TIMEOUT_MS is not a number: {}", ms))
            })?;
            if ms == 0 {
                return Err(ResearchError::config(
                    "RESEARCH_PROGRESS_TIMEOUT_MS must be at least 1",
                ));
            }
            config.progress_timeout = Duration::from_millis(ms);
        }

        if let Some(json) = get("SECTION_SEARCH_CONFIG") {
            config.sections = config.sections.with_json_overrides(&json)?;
        }

        Ok(config)
    }

    /// Limit applied to a run, clamped to `1..=max_limit`
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}
