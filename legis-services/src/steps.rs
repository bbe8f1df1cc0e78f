//! Pipeline step numbering and the current-step register

use legis_core::{ProgressEvent, ResearchError, SectionProgress};

/// Stages of a research run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Planning,
    SectionSearch,
    AttachmentExtraction,
    EvidenceBuild,
    Synthesis,
}

impl PipelineStep {
    /// Human-readable step name carried by progress and error events
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::Planning => "Planning query",
            PipelineStep::SectionSearch => "Searching sections",
            PipelineStep::AttachmentExtraction => "Extracting attachments",
            PipelineStep::EvidenceBuild => "Building evidence",
            PipelineStep::Synthesis => "Synthesizing report",
        }
    }

    /// 1-based step number. Steps after the search shift down by one when
    /// the attachment stage does not run.
    pub fn number(&self, has_attachments: bool) -> u32 {
        let shift = if has_attachments { 0 } else { 1 };
        match self {
            PipelineStep::Planning => 1,
            PipelineStep::SectionSearch => 2,
            PipelineStep::AttachmentExtraction => 3,
            PipelineStep::EvidenceBuild => 4 - shift,
            PipelineStep::Synthesis => 5 - shift,
        }
    }
}

/// Total number of steps of a run
pub fn total_steps(has_attachments: bool) -> u32 {
    if has_attachments {
        5
    } else {
        4
    }
}

/// Tracks the step in progress so failures can be reported against it
#[derive(Debug, Clone)]
pub struct StepTracker {
    has_attachments: bool,
    current: PipelineStep,
}

impl StepTracker {
    pub fn new(has_attachments: bool) -> Self {
        Self {
            has_attachments,
            current: PipelineStep::Planning,
        }
    }

    /// Record that `step` is about to begin
    pub fn enter(&mut self, step: PipelineStep) {
        debug_assert!(
            self.has_attachments || step != PipelineStep::AttachmentExtraction,
            "attachment step entered without attachments"
        );
        self.current = step;
    }

    pub fn current(&self) -> PipelineStep {
        self.current
    }

    pub fn number(&self) -> u32 {
        self.current.number(self.has_attachments)
    }

    pub fn name(&self) -> &'static str {
        self.current.name()
    }

    pub fn total(&self) -> u32 {
        total_steps(self.has_attachments)
    }

    /// Progress event for the current step
    pub fn progress_event(
        &self,
        message: Option<String>,
        section_progress: Option<SectionProgress>,
    ) -> ProgressEvent {
        ProgressEvent::Progress {
            step: self.number(),
            total_steps: self.total(),
            step_name: self.name().to_string(),
            message,
            section_progress,
        }
    }

    /// Error event tagged with the current step
    pub fn error_event(&self, error: &ResearchError) -> ProgressEvent {
        ProgressEvent::Error {
            step: self.number(),
            step_name: self.name().to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering_without_attachments() {
        assert_eq!(total_steps(false), 4);
        assert_eq!(PipelineStep::Planning.number(false), 1);
        assert_eq!(PipelineStep::SectionSearch.number(false), 2);
        assert_eq!(PipelineStep::EvidenceBuild.number(false), 3);
        assert_eq!(PipelineStep::Synthesis.number(false), 4);
    }

    #[test]
    fn test_numbering_with_attachments() {
        assert_eq!(total_steps(true), 5);
        assert_eq!(PipelineStep::AttachmentExtraction.number(true), 3);
        assert_eq!(PipelineStep::EvidenceBuild.number(true), 4);
        assert_eq!(PipelineStep::Synthesis.number(true), 5);
    }

    #[test]
    fn test_error_event_uses_last_entered_step() {
        let mut tracker = StepTracker::new(false);
        tracker.enter(PipelineStep::SectionSearch);

        let event = tracker.error_event(&ResearchError::search("provider down"));
        assert_eq!(
            event,
            ProgressEvent::Error {
                step: 2,
                step_name: "Searching sections".to_string(),
                message: "Section search failed: provider down".to_string(),
            }
        );
    }
}
