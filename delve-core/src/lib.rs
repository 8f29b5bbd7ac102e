//! # Delve Core
//!
//! Core library for Delve, an LLM-driven topic research engine.
//! Provides the LLM interface (brain), provider implementations,
//! configuration, error taxonomy, and the four-phase research pipeline.

pub mod brain;
pub mod config;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{CompletionService, LlmProvider, MockLlmProvider, StructuredSchema};
pub use config::{DelveConfig, load_config};
pub use error::{ConfigError, DelveError, LlmError, ResearchError, Result, WebError};
pub use research::{
    ContentFetcher, FetchOptions, Finding, ResearchCallback, ResearchEngine, ResearchPhase,
    ResearchReport, ResearchState, SearchGateway, SearchOptions, SearchResult,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
