//! Error types for the research pipeline

use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResearchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Query planning failed: {0}")]
    Planning(String),

    #[error("Section search failed: {0}")]
    Search(String),

    #[error("Attachment extraction failed: {0}")]
    Extraction(String),

    /// Transport-level failure while the synthesis stream was being consumed
    #[error("Stream/synthesis processing failed: {0}")]
    Synthesis(String),

    /// The accumulated synthesis text could not be parsed into sections
    #[error("Stream/synthesis processing failed: could not parse sections: {0}")]
    StreamParse(String),

    /// Progress sink rejected an event. Never fatal to a pipeline run.
    #[error("Progress emission failed: {0}")]
    Emission(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResearchError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ResearchError::InvalidRequest(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        ResearchError::Planning(msg.into())
    }

    pub fn search(msg: impl Into<String>) -> Self {
        ResearchError::Search(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        ResearchError::Extraction(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        ResearchError::Synthesis(msg.into())
    }

    pub fn stream_parse(msg: impl Into<String>) -> Self {
        ResearchError::StreamParse(msg.into())
    }

    pub fn emission(msg: impl Into<String>) -> Self {
        ResearchError::Emission(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        ResearchError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        ResearchError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        ResearchError::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ResearchError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ResearchError::Internal(msg.into())
    }
}

/// Result type alias for research operations
pub type ResearchResult<T> = Result<T, ResearchError>;
