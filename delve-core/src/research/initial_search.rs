//! Phase 1: broad keyword search seeding the finding set.

use super::context::PhaseContext;
use super::prompts::{self, QueryList, tags};
use super::sources::SearchResult;
use super::state::{Finding, ResearchPhase, ResearchState};
use crate::error::ResearchError;
use tracing::info;

/// What the initial search contributed.
#[derive(Debug, Clone, Default)]
pub struct InitialSearchOutcome {
    pub queries: Vec<String>,
    pub findings: Vec<Finding>,
    pub sources: Vec<String>,
}

pub struct InitialSearch<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> InitialSearch<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        state: &mut ResearchState,
    ) -> Result<InitialSearchOutcome, ResearchError> {
        self.ctx.enter(state, ResearchPhase::Searching)?;

        let prompt = prompts::initial_queries(state.query(), self.ctx.config.initial_query_count);
        let queries = self
            .ctx
            .llm
            .complete_structured::<QueryList>(
                state.session_id(),
                tags::INITIAL_QUERIES,
                &prompt,
                &prompts::query_list_schema(),
            )
            .await?
            .into_clean();

        self.ctx
            .callback
            .on_progress(&format!("Searching {} queries", queries.len()));

        let results: Vec<SearchResult> = self
            .ctx
            .search_many(&queries)
            .await
            .into_iter()
            .flat_map(|(_, results)| results)
            .collect();

        let findings = findings_from_results(&results);
        let sources = results.iter().map(|r| r.url.clone()).collect();

        info!(
            session_id = %state.session_id(),
            queries = queries.len(),
            results = results.len(),
            "Initial search complete"
        );

        state.append_search_results(results);
        state.append_findings(findings.clone());
        self.ctx.recorder.state_changed(state);

        Ok(InitialSearchOutcome {
            queries,
            findings,
            sources,
        })
    }
}

/// One finding per search result: snippet as content, URL as source.
pub fn findings_from_results(results: &[SearchResult]) -> Vec<Finding> {
    results
        .iter()
        .map(|r| Finding::new(r.snippet.clone(), r.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_findings_from_results_preserves_order() {
        let results = vec![
            SearchResult {
                title: "Tokio".into(),
                url: "https://tokio.rs".into(),
                snippet: "An asynchronous runtime".into(),
                position: 1,
            },
            SearchResult {
                title: "smol".into(),
                url: "https://github.com/smol-rs/smol".into(),
                snippet: "A small and fast async runtime".into(),
                position: 2,
            },
        ];
        let findings = findings_from_results(&results);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].content, "An asynchronous runtime");
        assert_eq!(findings[1].source, "https://github.com/smol-rs/smol");
    }

    #[test]
    fn test_findings_from_empty_results() {
        assert!(findings_from_results(&[]).is_empty());
    }
}
