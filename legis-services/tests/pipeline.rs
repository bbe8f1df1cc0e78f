//! End-to-end runs of the research pipeline against in-memory collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use legis_core::{
    Attachment, AttachmentExtractor, DocumentResult, DocumentSource, EvidenceRecord,
    ProgressEvent, ProgressSink, ProviderType, QueryPlan, QueryPlanner, ResearchError,
    ResearchRequest, ResearchResult, SearchProvider, SectionCompleteFn, SectionDocuments,
    SectionKey, SectionSearch, SectionSearchOutcome, SectionSearchParams, Synthesizer,
    TextStream, NO_RESULTS_SUMMARY,
};
use legis_services::{DeepResearchService, ProviderRegistry, ResearchConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;

// ----------------------------------------------------------------------------
// Collaborators
// ----------------------------------------------------------------------------

struct Planner {
    fail: bool,
}

#[async_trait]
impl QueryPlanner for Planner {
    async fn plan(&self, query: &str) -> ResearchResult<QueryPlan> {
        if self.fail {
            return Err(ResearchError::planning("model unavailable"));
        }
        Ok(QueryPlan {
            subqueries: vec![format!("{} purpose", query), format!("{} debate", query)],
            entities: vec!["Consumption Tax Act".to_string()],
            confidence: 0.8,
        })
    }
}

/// Returns a search hit for every provider id; never touches the network
struct StubProvider(&'static str);

#[async_trait]
impl SearchProvider for StubProvider {
    fn id(&self) -> &str {
        self.0
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Legislative
    }

    async fn search(&self, query: &str, limit: usize) -> ResearchResult<Vec<DocumentResult>> {
        Ok((0..limit.min(2))
            .map(|i| doc(&format!("https://{}/{}/{}", self.0, query, i), self.0))
            .collect())
    }
}

/// Completes every section in report order and returns fixed documents
struct FixedSectionSearch {
    documents: Vec<DocumentResult>,
}

#[async_trait]
impl SectionSearch for FixedSectionSearch {
    async fn search_sections(
        &self,
        _params: SectionSearchParams<'_>,
        on_section_complete: &SectionCompleteFn<'_>,
    ) -> ResearchResult<SectionSearchOutcome> {
        for section in SectionKey::ALL {
            on_section_complete(section);
        }

        let mut outcome = SectionSearchOutcome {
            documents: self.documents.clone(),
            iterations: 1,
            ..Default::default()
        };
        for document in &self.documents {
            outcome
                .section_hints
                .entry(document.dedup_key())
                .or_default()
                .insert(SectionKey::Purpose);
        }
        Ok(outcome)
    }
}

/// Reports two sections done, then fails the whole search
struct BrokenSectionSearch;

#[async_trait]
impl SectionSearch for BrokenSectionSearch {
    async fn search_sections(
        &self,
        _params: SectionSearchParams<'_>,
        on_section_complete: &SectionCompleteFn<'_>,
    ) -> ResearchResult<SectionSearchOutcome> {
        on_section_complete(SectionKey::Purpose);
        on_section_complete(SectionKey::Timeline);
        Err(ResearchError::search("section search backend crashed"))
    }
}

struct BrokenExtractor;

#[async_trait]
impl AttachmentExtractor for BrokenExtractor {
    async fn extract(
        &self,
        _query: &str,
        file_name: &str,
        _bytes: &[u8],
        _media_type: &str,
    ) -> ResearchResult<Vec<SectionDocuments>> {
        Err(ResearchError::extraction(format!("cannot read {}", file_name)))
    }
}

/// One document per attachment, filed under Background
struct Extractor;

#[async_trait]
impl AttachmentExtractor for Extractor {
    async fn extract(
        &self,
        _query: &str,
        file_name: &str,
        bytes: &[u8],
        _media_type: &str,
    ) -> ResearchResult<Vec<SectionDocuments>> {
        let mut document = doc(&format!("file://{}", file_name), "attachment");
        document.source.provider_type = ProviderType::Attachment;
        document.content = String::from_utf8_lossy(bytes).to_string();
        Ok(vec![SectionDocuments {
            section_key: SectionKey::Background,
            documents: vec![document],
        }])
    }
}

enum Script {
    Payload(String),
    BreakMidway,
}

struct ScriptedSynthesizer {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedSynthesizer {
    fn payload(payload: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Payload(payload.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self {
            script: Script::BreakMidway,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        _query: &str,
        _as_of_date: Option<NaiveDate>,
        _evidence: &[EvidenceRecord],
    ) -> ResearchResult<TextStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items: Vec<ResearchResult<String>> = match &self.script {
            Script::Payload(payload) => payload
                .as_bytes()
                .chunks(9)
                .map(|c| Ok(String::from_utf8_lossy(c).to_string()))
                .collect(),
            Script::BreakMidway => vec![
                Ok("{\"purpose\": ".to_string()),
                Err(ResearchError::network("stream reset")),
            ],
        };
        Ok(stream::iter(items).boxed())
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

#[async_trait]
impl ProgressSink for Recorder {
    async fn emit(&self, event: ProgressEvent) -> ResearchResult<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl ProgressSink for Failing {
    async fn emit(&self, _event: ProgressEvent) -> ResearchResult<()> {
        Err(ResearchError::emission("client disconnected"))
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

const SECTIONS_PAYLOAD: &str = r#"{"purpose": {"summary": "Raises the rate to 10%", "citations": ["e1", "e7", "e1"]}, "past_debates": {"summary": "Debated in 2012", "citations": ["e2"]}}"#;

fn doc(url: &str, provider_id: &str) -> DocumentResult {
    DocumentResult {
        id: url.to_string(),
        url: Some(url.to_string()),
        title: url.to_string(),
        content: String::new(),
        score: None,
        source: DocumentSource::new(provider_id, ProviderType::Legislative),
        extras: None,
    }
}

fn registry() -> ProviderRegistry {
    ProviderRegistry::new().with(Arc::new(StubProvider("kokkai")))
}

fn service(
    planner_fails: bool,
    documents: Vec<DocumentResult>,
    synthesizer: Arc<ScriptedSynthesizer>,
) -> DeepResearchService {
    DeepResearchService::new(
        Arc::new(Planner {
            fail: planner_fails,
        }),
        registry(),
        synthesizer,
        ResearchConfig::default(),
    )
    .with_section_search(Arc::new(FixedSectionSearch { documents }))
    .with_extractor(Arc::new(Extractor))
}

fn two_documents() -> Vec<DocumentResult> {
    vec![
        doc("https://kokkai.ndl.go.jp/a", "kokkai"),
        doc("https://kokkai.ndl.go.jp/b", "kokkai"),
        doc("https://kokkai.ndl.go.jp/a", "kokkai"),
    ]
}

fn attachment(name: &str) -> Attachment {
    Attachment {
        name: name.to_string(),
        content: STANDARD.encode(format!("contents of {}", name)),
        media_type: "text/plain".to_string(),
    }
}

fn terminal_events(events: &[ProgressEvent]) -> Vec<&ProgressEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

/// Step of each progress event, collapsing consecutive repeats
fn stage_steps(events: &[ProgressEvent]) -> Vec<(u32, u32, String)> {
    let mut steps: Vec<(u32, u32, String)> = Vec::new();
    for event in events {
        if let ProgressEvent::Progress {
            step,
            total_steps,
            step_name,
            ..
        } = event
        {
            if steps.last().map(|(s, _, _)| *s) != Some(*step) {
                steps.push((*step, *total_steps, step_name.clone()));
            }
        }
    }
    steps
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_four_steps_without_attachments() {
    let recorder = Arc::new(Recorder::default());
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));

    service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap();

    let events = recorder.events.lock();
    let steps = stage_steps(&events);
    assert_eq!(
        steps,
        vec![
            (1, 4, "Planning query".to_string()),
            (2, 4, "Searching sections".to_string()),
            (3, 4, "Building evidence".to_string()),
            (4, 4, "Synthesizing report".to_string()),
        ]
    );
    assert!(!events.iter().any(|e| matches!(
        e,
        ProgressEvent::Progress { step_name, .. } if step_name == "Extracting attachments"
    )));

    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].kind(), "complete");
    assert!(events.last().is_some_and(|e| e.is_terminal()));
}

#[tokio::test]
async fn test_five_steps_with_attachments() {
    let recorder = Arc::new(Recorder::default());
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));
    let request = ResearchRequest::new("consumption tax")
        .with_attachment(attachment("bill.txt"))
        .with_attachment(attachment("minutes.txt"));

    let response = service.run(&request, Some(recorder.clone())).await.unwrap();

    let events = recorder.events.lock();
    let steps = stage_steps(&events);
    let names: Vec<_> = steps.iter().map(|(_, _, n)| n.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Planning query",
            "Searching sections",
            "Extracting attachments",
            "Building evidence",
            "Synthesizing report",
        ]
    );
    assert!(steps.iter().all(|(_, total, _)| *total == 5));

    let attachment_message = events.iter().find_map(|e| match e {
        ProgressEvent::Progress { step: 3, message, .. } => message.clone(),
        _ => None,
    });
    assert!(attachment_message.is_some_and(|m| m.contains("2 attachment")));

    // Search results first, then attachments in request order
    let urls: Vec<_> = response
        .evidence
        .iter()
        .map(|e| e.url.clone().unwrap_or_default())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://kokkai.ndl.go.jp/a",
            "https://kokkai.ndl.go.jp/b",
            "file://bill.txt",
            "file://minutes.txt",
        ]
    );
    assert_eq!(
        response.evidence[2].section_hints,
        Some([SectionKey::Background].into_iter().collect())
    );
}

#[tokio::test]
async fn test_no_evidence_skips_synthesis() {
    let recorder = Arc::new(Recorder::default());
    let synthesizer = ScriptedSynthesizer::payload(SECTIONS_PAYLOAD);
    let service = service(false, Vec::new(), synthesizer.clone());

    let response = service
        .run(&ResearchRequest::new("unknown bill"), Some(recorder.clone()))
        .await
        .unwrap();

    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
    assert!(response.evidence.is_empty());
    assert_eq!(response.sections.timeline.summary, NO_RESULTS_SUMMARY);
    assert_eq!(response.metadata.total_results, 0);

    let events = recorder.events.lock();
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].kind(), "complete");
    assert!(!events.iter().any(|e| matches!(e, ProgressEvent::SynthesisChunk { .. })));
}

#[tokio::test]
async fn test_planner_failure_reports_step_one() {
    let recorder = Arc::new(Recorder::default());
    let service = service(true, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));

    let err = service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Planning(_)));

    let events = recorder.events.lock();
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        *terminal[0],
        ProgressEvent::Error {
            step: 1,
            step_name: "Planning query".to_string(),
            message: err.to_string(),
        }
    );
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));
    let err = service
        .run(&ResearchRequest::new("   "), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_stream_failure_reports_synthesis_step() {
    let recorder = Arc::new(Recorder::default());
    let service = service(false, two_documents(), ScriptedSynthesizer::broken());

    let err = service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Synthesis(_)));

    let events = recorder.events.lock();
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert!(matches!(
        terminal[0],
        ProgressEvent::Error { step: 4, step_name, .. } if step_name == "Synthesizing report"
    ));
    assert!(!events.iter().any(|e| e.kind() == "complete"));
}

#[tokio::test]
async fn test_chunks_concatenate_to_parsed_payload() {
    let recorder = Arc::new(Recorder::default());
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));

    let response = service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap();

    let events = recorder.events.lock();
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::SynthesisChunk { chunk } => Some(chunk.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, SECTIONS_PAYLOAD);

    // Unknown e7 dropped, repeated e1 collapsed
    assert_eq!(response.sections.purpose.citations, vec!["e1"]);
    assert_eq!(response.sections.past_debates.citations, vec!["e2"]);
    assert_eq!(response.evidence.len(), 2);
    assert_eq!(response.metadata.providers_used, vec!["kokkai"]);
    assert_eq!(response.metadata.subqueries.len(), 2);

    match events.last() {
        Some(ProgressEvent::Complete { result }) => assert_eq!(**result, response),
        other => panic!("expected complete event, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_section_progress_is_monotonic() {
    let recorder = Arc::new(Recorder::default());
    let service = DeepResearchService::new(
        Arc::new(Planner { fail: false }),
        registry(),
        ScriptedSynthesizer::payload(SECTIONS_PAYLOAD),
        ResearchConfig::default(),
    );

    service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap();

    let events = recorder.events.lock();
    let completed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress {
                section_progress: Some(progress),
                ..
            } => {
                assert_eq!(progress.total, SectionKey::COUNT);
                Some(progress.completed)
            }
            _ => None,
        })
        .collect();

    assert!(completed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(completed.last(), Some(&SectionKey::COUNT));
    assert_eq!(completed.len(), SectionKey::COUNT + 1);
}

#[tokio::test]
async fn test_failing_sink_does_not_abort_run() {
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));

    let response = service
        .run(&ResearchRequest::new("consumption tax"), Some(Arc::new(Failing)))
        .await
        .unwrap();
    assert_eq!(response.evidence.len(), 2);
}

#[tokio::test]
async fn test_runs_without_sink() {
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));

    let response = service
        .run(&ResearchRequest::new("consumption tax"), None)
        .await
        .unwrap();
    assert_eq!(response.sections.purpose.summary, "Raises the rate to 10%");
}

#[tokio::test]
async fn test_unknown_providers_fail_search_step() {
    let recorder = Arc::new(Recorder::default());
    let service = service(false, two_documents(), ScriptedSynthesizer::payload(SECTIONS_PAYLOAD));
    let request =
        ResearchRequest::new("consumption tax").with_providers(vec!["nowhere".to_string()]);

    let err = service
        .run(&request, Some(recorder.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Search(_)));

    let events = recorder.events.lock();
    assert!(matches!(
        terminal_events(&events)[..],
        [ProgressEvent::Error { step: 2, .. }]
    ));
}

#[tokio::test]
async fn test_section_search_failure_reports_search_step() {
    let recorder = Arc::new(Recorder::default());
    let synthesizer = ScriptedSynthesizer::payload(SECTIONS_PAYLOAD);
    let service = service(false, two_documents(), synthesizer.clone())
        .with_section_search(Arc::new(BrokenSectionSearch));

    let err = service
        .run(&ResearchRequest::new("consumption tax"), Some(recorder.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Search(_)));
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);

    let events = recorder.events.lock();
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        *terminal[0],
        ProgressEvent::Error {
            step: 2,
            step_name: "Searching sections".to_string(),
            message: err.to_string(),
        }
    );
    assert!(!events.iter().any(|e| e.kind() == "complete"));
}

#[tokio::test]
async fn test_extractor_failure_reports_attachment_step() {
    let recorder = Arc::new(Recorder::default());
    let synthesizer = ScriptedSynthesizer::payload(SECTIONS_PAYLOAD);
    let service = service(false, two_documents(), synthesizer.clone())
        .with_extractor(Arc::new(BrokenExtractor));
    let request = ResearchRequest::new("consumption tax").with_attachment(attachment("bill.txt"));

    let err = service
        .run(&request, Some(recorder.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ResearchError::Extraction(_)));
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);

    let events = recorder.events.lock();
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(
        *terminal[0],
        ProgressEvent::Error {
            step: 3,
            step_name: "Extracting attachments".to_string(),
            message: err.to_string(),
        }
    );
    assert!(events.iter().all(|e| match e {
        ProgressEvent::Progress { total_steps, .. } => *total_steps == 5,
        _ => true,
    }));
    assert!(!events.iter().any(|e| e.kind() == "complete"));
}

#[tokio::test]
async fn test_undrained_bounded_sink_does_not_hang_run() {
    // Holds one event; nobody reads it, so every later delivery blocks
    let (tx, _rx) = mpsc::channel::<ProgressEvent>(1);
    let config = ResearchConfig {
        progress_timeout: Duration::from_millis(50),
        ..ResearchConfig::default()
    };
    let service = DeepResearchService::new(
        Arc::new(Planner { fail: false }),
        registry(),
        ScriptedSynthesizer::payload(SECTIONS_PAYLOAD),
        config,
    )
    .with_section_search(Arc::new(FixedSectionSearch {
        documents: two_documents(),
    }));

    let response = tokio::time::timeout(
        Duration::from_secs(5),
        service.run(&ResearchRequest::new("consumption tax"), Some(Arc::new(tx))),
    )
    .await
    .expect("run must finish with a stalled sink")
    .unwrap();

    assert_eq!(response.evidence.len(), 2);
}
