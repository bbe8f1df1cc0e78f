use async_trait::async_trait;
use legis_core::{
    DocumentResult, DocumentSource, ProviderType, ResearchError, SearchProvider, PROVIDER_WEB,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const EXA_API_BASE: &str = "https://api.exa.ai";

/// Maximum characters of page text kept per document
const MAX_TEXT_CHARS: usize = 3000;

#[derive(Debug, Clone)]
pub struct ExaClient {
    client: Client,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_results: Option<u32>,
    #[serde(rename = "type")]
    pub search_type: String, // "auto", "neural", "fast"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    pub contents: ExaContentsOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaContentsOptions {
    pub text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<ExaHighlightOptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaHighlightOptions {
    pub num_sentences: u32,
    pub highlights_per_url: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSearchResponse {
    pub results: Vec<ExaSearchResult>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSearchResult {
    pub url: String,
    pub title: Option<String>,
    pub id: String,
    pub score: Option<f64>,
    pub published_date: Option<String>,
    pub author: Option<String>,
    pub text: Option<String>,
    pub highlights: Option<Vec<String>>,
}

impl ExaSearchResult {
    /// Convert into a pipeline document
    pub fn into_document(self) -> DocumentResult {
        let mut extras = serde_json::Map::new();
        if let Some(date) = &self.published_date {
            extras.insert("publishedDate".to_string(), date.clone().into());
        }
        if let Some(author) = &self.author {
            extras.insert("author".to_string(), author.clone().into());
        }

        // Prefer the page text, fall back to highlights
        let content = match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.chars().take(MAX_TEXT_CHARS).collect(),
            _ => self.highlights.unwrap_or_default().join("\n"),
        };

        DocumentResult {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| self.url.clone()),
            id: self.id,
            url: Some(self.url),
            content,
            score: self.score,
            source: DocumentSource::new(PROVIDER_WEB, ProviderType::Web),
            extras: (!extras.is_empty()).then_some(extras),
        }
    }
}

impl ExaClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ResearchError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Create a client from `EXA_API_KEY`
    pub fn from_env() -> Result<Self, ResearchError> {
        let api_key = std::env::var("EXA_API_KEY")
            .map_err(|_| ResearchError::config("EXA_API_KEY environment variable not set"))?;
        Self::new(api_key)
    }

    #[instrument(skip(self))]
    pub async fn search(&self, request: ExaSearchRequest) -> Result<ExaSearchResponse, ResearchError> {
        let url = format!("{}/search", EXA_API_BASE);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearchError::network(format!("Exa API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::api(format!("Exa API error ({}): {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| ResearchError::parse(format!("Failed to parse Exa response: {}", e)))
    }

    /// Semantic web search returning page text and highlights
    pub async fn search_web(&self, query: &str, num_results: u32) -> Result<ExaSearchResponse, ResearchError> {
        let request = ExaSearchRequest {
            query: query.to_string(),
            num_results: Some(num_results),
            search_type: "neural".to_string(),
            include_domains: None,
            contents: ExaContentsOptions {
                text: true,
                highlights: Some(ExaHighlightOptions {
                    num_sentences: 3,
                    highlights_per_url: 2,
                    query: Some(query.to_string()),
                }),
            },
        };

        self.search(request).await
    }
}

#[async_trait]
impl SearchProvider for ExaClient {
    fn id(&self) -> &str {
        PROVIDER_WEB
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Web
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DocumentResult>, ResearchError> {
        let num_results = limit.clamp(1, 100) as u32;
        let response = self.search_web(query, num_results).await?;
        debug!("Exa returned {} results for {:?}", response.results.len(), query);

        Ok(response
            .results
            .into_iter()
            .map(ExaSearchResult::into_document)
            .collect())
    }
}
