//! Search providers and AI collaborators for legislative deep research
//!
//! This crate provides the default implementations of the pipeline's
//! collaborators: Diet minutes search through the Kokkai API, web search
//! through Exa AI, and OpenAI for query planning, attachment extraction and
//! streamed section synthesis.

pub mod exa;
pub mod kokkai;
pub mod openai;

pub use exa::{ExaClient, ExaSearchRequest, ExaSearchResponse, ExaSearchResult};
pub use kokkai::{KokkaiClient, SpeechRecord, SpeechSearchResponse};
pub use openai::{extract_json, OpenAIClient, ATTACHMENT_PROVIDER_ID};
