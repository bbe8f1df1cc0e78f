//! Synthesis stream coordination
//!
//! Consumes the synthesizer's text stream, forwarding each fragment to the
//! progress channel and accumulating the full text for parsing.

use futures::StreamExt;
use legis_core::{
    DeepResearchSections, ProgressEvent, ResearchError, ResearchResult, SectionKey, TextStream,
};
use legis_research::extract_json;
use tracing::{debug, warn};

use crate::progress_channel::ProgressChannel;

/// Parsed synthesis output together with the raw accumulated text
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub sections: DeepResearchSections,
    pub raw: String,
}

/// Drain `stream`, forwarding every fragment as a `synthesis_chunk` event.
///
/// Delivery of chunks is best effort and never interrupts consumption. A
/// stream error or an unparseable result fails the stage.
pub async fn consume_synthesis(
    mut stream: TextStream,
    channel: &ProgressChannel,
) -> ResearchResult<SynthesisOutput> {
    let mut raw = String::new();
    let mut chunks = 0usize;

    while let Some(item) = stream.next().await {
        let chunk = item.map_err(|e| match e {
            ResearchError::Synthesis(_) => e,
            other => ResearchError::synthesis(other.to_string()),
        })?;

        if chunk.is_empty() {
            continue;
        }

        raw.push_str(&chunk);
        chunks += 1;
        channel.send(ProgressEvent::SynthesisChunk { chunk });
    }

    debug!("Synthesis stream ended after {} chunks ({} bytes)", chunks, raw.len());

    let sections = parse_sections(&raw)?;
    Ok(SynthesisOutput { sections, raw })
}

/// Parse accumulated synthesis text into sections
pub fn parse_sections(raw: &str) -> ResearchResult<DeepResearchSections> {
    let json = extract_json(raw).map_err(|e| ResearchError::stream_parse(e.to_string()))?;

    // Accept either the bare sections object or one wrapped in {"sections": ...}
    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| ResearchError::stream_parse(e.to_string()))?;
    let value = match value {
        serde_json::Value::Object(mut map) if map.contains_key("sections") => {
            map.remove("sections").unwrap_or_default()
        }
        other => other,
    };

    let Some(object) = value.as_object() else {
        warn!("Synthesis output is not a JSON object");
        return Err(ResearchError::stream_parse("expected a JSON object"));
    };

    if !SectionKey::ALL.iter().any(|key| object.contains_key(key.as_str())) {
        warn!("Synthesis output names no report section");
        return Err(ResearchError::stream_parse("expected at least one report section"));
    }

    serde_json::from_value(value).map_err(|e| ResearchError::stream_parse(e.to_string()))
}
