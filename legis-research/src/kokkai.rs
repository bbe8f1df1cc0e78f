//! National Diet Library minutes search client
//!
//! Queries the speech endpoint of the Diet minutes API and maps each
//! speech record to a pipeline document.

use async_trait::async_trait;
use legis_core::{
    DocumentResult, DocumentSource, ProviderType, ResearchError, SearchProvider, PROVIDER_KOKKAI,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const KOKKAI_API_BASE: &str = "https://kokkai.ndl.go.jp/api";

/// The speech endpoint returns at most this many records per call
const MAX_RECORDS: usize = 100;

/// Maximum characters of a speech kept per document
const MAX_SPEECH_CHARS: usize = 3000;

#[derive(Debug, Clone)]
pub struct KokkaiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSearchResponse {
    #[serde(default)]
    pub number_of_records: u64,
    #[serde(default)]
    pub speech_record: Vec<SpeechRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechRecord {
    #[serde(rename = "speechID")]
    pub speech_id: String,
    #[serde(rename = "issueID", default)]
    pub issue_id: Option<String>,
    #[serde(default)]
    pub session: Option<u32>,
    #[serde(rename = "nameOfHouse", default)]
    pub name_of_house: Option<String>,
    #[serde(rename = "nameOfMeeting", default)]
    pub name_of_meeting: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(rename = "speakerGroup", default)]
    pub speaker_group: Option<String>,
    #[serde(default)]
    pub speech: Option<String>,
    #[serde(rename = "speechURL", default)]
    pub speech_url: Option<String>,
}

impl SpeechRecord {
    fn title(&self) -> String {
        [
            self.name_of_house.as_deref(),
            self.name_of_meeting.as_deref(),
            self.issue.as_deref(),
            self.date.as_deref(),
            self.speaker.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Convert into a pipeline document
    pub fn into_document(self) -> DocumentResult {
        let mut extras = serde_json::Map::new();
        if let Some(session) = self.session {
            extras.insert("session".to_string(), session.into());
        }
        for (key, value) in [
            ("house", &self.name_of_house),
            ("meeting", &self.name_of_meeting),
            ("date", &self.date),
            ("speaker", &self.speaker),
            ("speakerGroup", &self.speaker_group),
            ("issueId", &self.issue_id),
        ] {
            if let Some(value) = value {
                extras.insert(key.to_string(), value.clone().into());
            }
        }

        let title = self.title();
        let content = self
            .speech
            .unwrap_or_default()
            .chars()
            .take(MAX_SPEECH_CHARS)
            .collect();

        DocumentResult {
            id: self.speech_id,
            url: self.speech_url,
            title,
            content,
            score: None,
            source: DocumentSource::new(PROVIDER_KOKKAI, ProviderType::Legislative),
            extras: (!extras.is_empty()).then_some(extras),
        }
    }
}

impl KokkaiClient {
    pub fn new() -> Result<Self, ResearchError> {
        Self::with_base_url(KOKKAI_API_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, ResearchError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| ResearchError::config(format!("Invalid Kokkai API base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| ResearchError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client honoring `KOKKAI_API_BASE` when set
    pub fn from_env() -> Result<Self, ResearchError> {
        match std::env::var("KOKKAI_API_BASE") {
            Ok(base) => Self::with_base_url(&base),
            Err(_) => Self::new(),
        }
    }

    /// Full-text search over individual speeches
    #[instrument(skip(self))]
    pub async fn search_speeches(
        &self,
        query: &str,
        max_records: usize,
    ) -> Result<SpeechSearchResponse, ResearchError> {
        let url = format!("{}/speech", self.base_url);
        let max_records = max_records.clamp(1, MAX_RECORDS).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("any", query),
                ("maximumRecords", max_records.as_str()),
                ("recordPacking", "json"),
            ])
            .send()
            .await
            .map_err(|e| ResearchError::network(format!("Kokkai API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::api(format!(
                "Kokkai API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ResearchError::parse(format!("Failed to parse Kokkai response: {}", e)))
    }
}

#[async_trait]
impl SearchProvider for KokkaiClient {
    fn id(&self) -> &str {
        PROVIDER_KOKKAI
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Legislative
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DocumentResult>, ResearchError> {
        let response = self.search_speeches(query, limit).await?;
        debug!(
            "Kokkai matched {} speeches, returned {}",
            response.number_of_records,
            response.speech_record.len()
        );

        Ok(response
            .speech_record
            .into_iter()
            .map(SpeechRecord::into_document)
            .collect())
    }
}
