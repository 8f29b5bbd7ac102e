//! Leaf-service seams: the search gateway and the content fetcher.
//!
//! Concrete HTTP clients live in `delve-tools`; the engine only sees these
//! traits, held as `Arc<dyn _>`.

use crate::error::WebError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// 1-based rank within the search call that produced it.
    pub position: usize,
}

/// Options for a single search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Number of results to return, within `1..=100`.
    pub max_results: usize,
    /// 1-based index of the first result.
    pub start_index: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            start_index: 1,
        }
    }
}

impl SearchOptions {
    pub fn with_max_results(max_results: usize) -> Self {
        Self {
            max_results,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), WebError> {
        if !(1..=100).contains(&self.max_results) {
            return Err(WebError::InvalidArguments {
                operation: "search".to_string(),
                reason: format!("max_results must be within 1..=100, got {}", self.max_results),
            });
        }
        if self.start_index < 1 {
            return Err(WebError::InvalidArguments {
                operation: "search".to_string(),
                reason: "start_index must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Options for a single fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum characters returned.
    pub max_length: usize,
    /// 0-based character offset into the normalized text.
    pub start_index: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_length: 10_000,
            start_index: 0,
        }
    }
}

impl FetchOptions {
    /// Apply the character window to already-normalized text.
    pub fn window(&self, text: &str) -> String {
        text.chars()
            .skip(self.start_index)
            .take(self.max_length)
            .collect()
    }
}

/// Issues web search queries.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>, WebError>;
}

/// Retrieves a URL and normalizes it to readable text.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<String, WebError>;
}
