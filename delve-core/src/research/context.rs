//! Dependencies shared by every phase executor.

use super::callback::ResearchCallback;
use super::recorder::RecorderHandle;
use super::sources::{ContentFetcher, SearchGateway, SearchOptions, SearchResult};
use super::state::{ResearchPhase, ResearchState};
use crate::brain::CompletionService;
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a phase needs besides the state itself.
#[derive(Clone)]
pub struct PhaseContext {
    pub llm: CompletionService,
    pub search: Arc<dyn SearchGateway>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub recorder: RecorderHandle,
    pub callback: Arc<dyn ResearchCallback>,
    pub config: ResearchConfig,
}

impl PhaseContext {
    /// Advance the state into `phase` and notify observers.
    pub fn enter(&self, state: &mut ResearchState, phase: ResearchPhase) -> Result<(), ResearchError> {
        state.transition(phase)?;
        info!(session_id = %state.session_id(), phase = %phase, "Entering research phase");
        self.callback.on_phase_change(phase);
        self.recorder.state_changed(state);
        Ok(())
    }

    /// Run every query concurrently.
    ///
    /// The output is in submission order. A failed search yields an empty list
    /// for its query and never affects its siblings.
    pub async fn search_many(&self, queries: &[String]) -> Vec<(String, Vec<SearchResult>)> {
        let options = SearchOptions::with_max_results(self.config.results_per_query);
        let searches = queries.iter().map(|query| async move {
            let results = match self.search.search(query, options).await {
                Ok(results) => {
                    debug!(query = %query, count = results.len(), "Search completed");
                    results
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed; treating as zero results");
                    Vec::new()
                }
            };
            (query.clone(), results)
        });
        join_all(searches).await
    }
}
