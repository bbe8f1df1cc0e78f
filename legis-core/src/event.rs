//! Progress events streamed to callers while a research run executes

use serde::{Deserialize, Serialize};

use crate::report::DeepResearchResponse;

/// Wire tags of the known event variants
pub const EVENT_TYPES: [&str; 4] = ["progress", "synthesis_chunk", "complete", "error"];

/// Sub-progress of the section search stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub completed: usize,
    pub total: usize,
}

/// One message in the ordered event stream of a research run.
///
/// The set of variants is closed; match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    /// A stage began, or the section search stage advanced
    Progress {
        step: u32,
        total_steps: u32,
        step_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section_progress: Option<SectionProgress>,
    },
    /// One fragment of synthesis output, in stream order
    SynthesisChunk { chunk: String },
    /// Terminal event of a successful run
    Complete { result: Box<DeepResearchResponse> },
    /// Terminal event of a failed run
    Error {
        step: u32,
        step_name: String,
        message: String,
    },
}

impl ProgressEvent {
    /// Wire tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::SynthesisChunk { .. } => "synthesis_chunk",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }

    /// Decode a wire frame.
    ///
    /// Frames whose `type` is not one of [`EVENT_TYPES`] decode to `Ok(None)` so
    /// newer producers do not break older consumers.
    pub fn from_wire(frame: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(frame)?;
        let known = value
            .get("type")
            .and_then(|t| t.as_str())
            .is_some_and(|t| EVENT_TYPES.contains(&t));
        if !known {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some)
    }
}
