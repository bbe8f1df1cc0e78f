//! Registry of search providers keyed by provider id

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use legis_core::{ResearchError, ResearchResult, SearchProvider};
use legis_research::{ExaClient, KokkaiClient};
use tracing::{info, warn};

/// Search providers available to the pipeline
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the default providers
    ///
    /// The Diet minutes search is always registered. Web search requires
    /// EXA_API_KEY.
    pub fn from_env() -> ResearchResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(KokkaiClient::from_env()?));

        match ExaClient::from_env() {
            Ok(exa) => registry.register(Arc::new(exa)),
            Err(e) => info!("Web search provider disabled: {}", e),
        }

        Ok(registry)
    }

    /// Add a provider, replacing any provider with the same id
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        let id = provider.id().to_string();
        if self.providers.insert(id.clone(), provider).is_some() {
            warn!("Replaced search provider {}", id);
        }
    }

    pub fn with(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Registered provider ids, sorted
    pub fn ids(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve provider ids to handles, in the order given.
    ///
    /// Unknown and repeated ids are skipped. Resolving to nothing is an error.
    pub fn resolve(&self, ids: &[String]) -> ResearchResult<Vec<Arc<dyn SearchProvider>>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(ids.len());

        for id in ids {
            let id = id.trim();
            if !seen.insert(id) {
                continue;
            }
            match self.get(id) {
                Some(provider) => resolved.push(provider),
                None => warn!("Ignoring unknown search provider: {}", id),
            }
        }

        if resolved.is_empty() {
            return Err(ResearchError::search(format!(
                "No search providers available (requested: {}; registered: {})",
                ids.join(", "),
                self.ids().join(", ")
            )));
        }

        Ok(resolved)
    }
}
