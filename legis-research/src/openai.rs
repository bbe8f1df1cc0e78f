use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use legis_core::{
    AttachmentExtractor, DocumentResult, DocumentSource, EvidenceRecord, ProviderType,
    QueryPlan, QueryPlanner, ResearchError, SectionDocuments, SectionKey, Synthesizer,
    TextStream,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

/// Provider id stamped on documents extracted from attachments
pub const ATTACHMENT_PROVIDER_ID: &str = "attachment";

/// Attachment text beyond this many characters is not sent to the model
const MAX_ATTACHMENT_CHARS: usize = 24_000;

/// Evidence content beyond this many characters is truncated in the prompt
const MAX_EVIDENCE_CHARS: usize = 1_200;

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIClient {
    pub fn new() -> Result<Self, ResearchError> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(ResearchError::config(
                "OPENAI_API_KEY environment variable not set",
            ));
        }

        // async-openai reads OPENAI_API_KEY from env automatically
        let config = OpenAIConfig::default();
        let client = Client::with_config(config);

        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        Ok(Self { client, model })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn build_request(
        &self,
        system_prompt: &str,
        user_prompt: String,
        temperature: f32,
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, ResearchError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| ResearchError::internal(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()
                    .map_err(|e| ResearchError::internal(e.to_string()))?
                    .into(),
            ])
            .temperature(temperature)
            .stream(stream)
            .build()
            .map_err(|e| ResearchError::internal(e.to_string()))
    }

    /// Run a non-streaming completion and return the JSON part of the reply
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: String,
        temperature: f32,
    ) -> Result<String, ResearchError> {
        let request = self.build_request(system_prompt, user_prompt, temperature, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ResearchError::api(format!("OpenAI API error: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| ResearchError::parse("No response from OpenAI"))?;

        extract_json(content)
    }
}

// ============================================================================
// Query Planning
// ============================================================================

const PLANNER_PROMPT: &str = r#"You are a research planner for questions about legislative proceedings (bills, amendments, committee deliberations, plenary debates).

Break the user's question into 3-6 focused search queries that together cover: the purpose of the measure, its current status, its history, the main points of contention, and past debates in the legislature. Also list the named entities (bills, laws, committees, people, parties) the question refers to.

Respond with valid JSON in this exact format:
{
  "subqueries": ["search query 1", "search query 2"],
  "entities": ["entity 1", "entity 2"],
  "confidence": 0.0
}

"confidence" is your confidence (0.0 to 1.0) that the subqueries capture the question."#;

#[async_trait]
impl QueryPlanner for OpenAIClient {
    #[instrument(skip(self))]
    async fn plan(&self, query: &str) -> Result<QueryPlan, ResearchError> {
        let json_str = self
            .complete_json(PLANNER_PROMPT, format!("Question: {}", query), 0.2)
            .await?;

        let plan: QueryPlan = serde_json::from_str(&json_str)
            .map_err(|e| ResearchError::parse(format!("Failed to parse query plan: {}", e)))?;

        info!(
            "Planned {} subqueries ({} entities, confidence {:.2})",
            plan.subqueries.len(),
            plan.entities.len(),
            plan.confidence
        );

        Ok(plan)
    }
}

// ============================================================================
// Attachment Extraction
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedSection {
    section_key: SectionKey,
    #[serde(default)]
    excerpts: Vec<ExtractedExcerpt>,
}

#[derive(Debug, Deserialize)]
struct ExtractedExcerpt {
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExtractionReply {
    #[serde(default)]
    sections: Vec<ExtractedSection>,
}

fn extraction_prompt() -> String {
    let keys = SectionKey::ALL
        .iter()
        .map(|k| format!("- \"{}\": {}", k.as_str(), k.display_name()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You extract evidence from a document supplied by the user for a research report on legislative proceedings.

Assign relevant verbatim excerpts of the document to the report sections below. Skip sections the document says nothing about. Keep each excerpt under 800 characters.

Sections:
{}

Respond with valid JSON in this exact format:
{{
  "sections": [
    {{
      "sectionKey": "purpose",
      "excerpts": [{{"title": "Short label", "content": "Verbatim excerpt", "page": null}}]
    }}
  ]
}}"#,
        keys
    )
}

/// Whether attachments of this media type can be read as text
fn is_text_media(media_type: &str) -> bool {
    let media_type = media_type.trim().to_lowercase();
    media_type.starts_with("text/")
        || matches!(
            media_type.as_str(),
            "application/json" | "application/xml" | "application/markdown"
        )
}

fn excerpts_into_documents(file_name: &str, reply: ExtractionReply) -> Vec<SectionDocuments> {
    reply
        .sections
        .into_iter()
        .map(|section| {
            let documents = section
                .excerpts
                .into_iter()
                .enumerate()
                .filter(|(_, excerpt)| !excerpt.content.trim().is_empty())
                .map(|(i, excerpt)| {
                    let mut extras = serde_json::Map::new();
                    extras.insert("fileName".to_string(), file_name.into());
                    if let Some(page) = excerpt.page {
                        extras.insert("page".to_string(), page.into());
                    }

                    DocumentResult {
                        id: format!("{}#{}-{}", file_name, section.section_key, i + 1),
                        url: None,
                        title: if excerpt.title.trim().is_empty() {
                            file_name.to_string()
                        } else {
                            excerpt.title
                        },
                        content: excerpt.content,
                        score: None,
                        source: DocumentSource::new(
                            ATTACHMENT_PROVIDER_ID,
                            ProviderType::Attachment,
                        ),
                        extras: Some(extras),
                    }
                })
                .collect();

            SectionDocuments {
                section_key: section.section_key,
                documents,
            }
        })
        .collect()
}

#[async_trait]
impl AttachmentExtractor for OpenAIClient {
    #[instrument(skip(self, query, bytes))]
    async fn extract(
        &self,
        query: &str,
        file_name: &str,
        bytes: &[u8],
        media_type: &str,
    ) -> Result<Vec<SectionDocuments>, ResearchError> {
        if !is_text_media(media_type) {
            warn!(
                "Skipping attachment {} with unsupported media type {}",
                file_name, media_type
            );
            return Ok(Vec::new());
        }

        let text: String = String::from_utf8_lossy(bytes)
            .chars()
            .take(MAX_ATTACHMENT_CHARS)
            .collect();
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let user_prompt = format!(
            "## Research question\n{}\n\n## Document: {}\n{}",
            query, file_name, text
        );

        let json_str = self
            .complete_json(&extraction_prompt(), user_prompt, 0.1)
            .await
            .map_err(|e| ResearchError::extraction(format!("{}: {}", file_name, e)))?;

        let reply: ExtractionReply = serde_json::from_str(&json_str).map_err(|e| {
            ResearchError::extraction(format!("Failed to parse extraction of {}: {}", file_name, e))
        })?;

        Ok(excerpts_into_documents(file_name, reply))
    }
}

// ============================================================================
// Section Synthesis
// ============================================================================

fn synthesis_prompt() -> String {
    let fields = SectionKey::ALL
        .iter()
        .map(|k| {
            format!(
                "  \"{}\": {{\"summary\": \"{} in markdown\", \"citations\": [\"e1\"]}}",
                k.as_str(),
                k.display_name()
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"You are a legislative research analyst writing a structured briefing.

Using ONLY the numbered evidence provided, write a summary for each report section. Cite evidence by its id (e.g. "e3") in the "citations" array of the section that uses it. Do not invent ids. If the evidence says nothing about a section, say so briefly and leave its citations empty. Each evidence item lists the sections it was retrieved for as a hint.

Respond with a single JSON object and nothing else, in this exact format:
{{
{}
}}"#,
        fields
    )
}

fn format_evidence(evidence: &[EvidenceRecord]) -> String {
    let mut out = String::new();
    for record in evidence {
        out.push_str(&format!("\n### [{}] {}\n", record.id, record.title));
        if let Some(url) = &record.url {
            out.push_str(&format!("URL: {}\n", url));
        }
        out.push_str(&format!("Source: {}\n", record.source.provider_id));
        if let Some(hints) = &record.section_hints {
            let hints = hints.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(", ");
            out.push_str(&format!("Sections: {}\n", hints));
        }
        let truncated: String = record.content.chars().take(MAX_EVIDENCE_CHARS).collect();
        out.push_str(&format!("\n{}\n", truncated));
    }
    out
}

#[async_trait]
impl Synthesizer for OpenAIClient {
    #[instrument(skip(self, evidence), fields(evidence = evidence.len()))]
    async fn synthesize(
        &self,
        query: &str,
        as_of_date: Option<NaiveDate>,
        evidence: &[EvidenceRecord],
    ) -> Result<TextStream, ResearchError> {
        let as_of = as_of_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());

        let user_prompt = format!(
            "## Question\n{}\n\n## As of\n{}\n\n## Evidence\n{}",
            query,
            as_of,
            format_evidence(evidence)
        );

        let request = self.build_request(&synthesis_prompt(), user_prompt, 0.3, true)?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| ResearchError::synthesis(format!("OpenAI API error: {}", e)))?;

        let text = stream.filter_map(|item| async move {
            match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(ResearchError::synthesis(format!(
                    "OpenAI stream error: {}",
                    e
                )))),
            }
        });

        Ok(text.boxed())
    }
}

/// Extract JSON from a string that might contain markdown code blocks
pub fn extract_json(content: &str) -> Result<String, ResearchError> {
    // Try to find JSON in code blocks first
    if let Some(start) = content.find("```json") {
        let start = start + 7;
        if let Some(end) = content[start..].find("```") {
            return Ok(content[start..start + end].trim().to_string());
        }
    }

    // Try to find raw JSON
    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if end > start {
                return Ok(content[start..=end].to_string());
            }
        }
    }

    Err(ResearchError::parse("No JSON found in response"))
}
