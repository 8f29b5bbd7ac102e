//! Phase 3: per-strategy fan-out investigation.
//!
//! Every strategy runs independently and concurrently through five stages:
//! query generation, search, fetch, relevance gate, and extraction. Each
//! stage fans out over its items and joins before the next stage starts.
//! Items carry their own URL, title, and originating query through every
//! stage, so filtering can never mis-attribute a source.
//!
//! Failures are contained at the smallest unit that failed: a search query,
//! a page, a judgment, an extraction, or (for query generation) the whole
//! strategy. None of them fail the phase.

use super::context::PhaseContext;
use super::prompts::{self, QueryList, RelevanceJudgment, tags};
use super::sources::{FetchOptions, SearchResult};
use super::state::{Finding, InvestigationStrategy, ResearchPhase, ResearchState};
use crate::error::ResearchError;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-strategy counters, one stage per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyReport {
    pub question: String,
    pub queries: usize,
    /// Results kept after the per-strategy ceiling.
    pub results: usize,
    /// Pages fetched successfully and long enough to keep.
    pub fetched: usize,
    /// Pages admitted by the relevance gate.
    pub relevant: usize,
    pub findings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InvestigationOutcome {
    pub strategies: Vec<StrategyReport>,
    pub findings: Vec<Finding>,
}

/// A search hit moving through the pipeline.
#[derive(Debug, Clone)]
struct Candidate {
    url: String,
    title: String,
    query: String,
}

#[derive(Debug, Clone)]
struct FetchedPage {
    candidate: Candidate,
    body: String,
}

struct StrategyOutcome {
    report: StrategyReport,
    search_results: Vec<SearchResult>,
    web_contents: Vec<String>,
    findings: Vec<Finding>,
}

impl StrategyOutcome {
    fn empty(report: StrategyReport) -> Self {
        Self {
            report,
            search_results: Vec::new(),
            web_contents: Vec::new(),
            findings: Vec::new(),
        }
    }
}

/// Take rank 1 of every query, then rank 2, and so on, in query order.
///
/// Every specialized query gets a share of the per-strategy ceiling.
fn interleave_by_rank(searched: &[(String, Vec<SearchResult>)]) -> Vec<Candidate> {
    let depth = searched
        .iter()
        .map(|(_, results)| results.len())
        .max()
        .unwrap_or(0);
    (0..depth)
        .flat_map(|rank| {
            searched.iter().filter_map(move |(query, results)| {
                results.get(rank).map(|result| Candidate {
                    url: result.url.clone(),
                    title: result.title.clone(),
                    query: query.clone(),
                })
            })
        })
        .collect()
}

pub struct Investigation<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> Investigation<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        state: &mut ResearchState,
    ) -> Result<InvestigationOutcome, ResearchError> {
        self.ctx.enter(state, ResearchPhase::Investigating)?;
        let plan = state
            .research_plan
            .clone()
            .ok_or(ResearchError::MissingPlan)?;
        let session_id = state.session_id();
        let query = state.query().to_string();

        let runs = plan
            .investigation_strategies
            .iter()
            .map(|strategy| self.investigate(session_id, &query, strategy));
        let outcomes = join_all(runs).await;

        let mut findings = Vec::new();
        let mut strategies = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            state.append_search_results(outcome.search_results);
            state.web_contents.extend(outcome.web_contents);
            findings.extend(outcome.findings);
            strategies.push(outcome.report);
        }

        info!(
            session_id = %session_id,
            strategies = strategies.len(),
            findings = findings.len(),
            "Investigation complete"
        );

        state.append_findings(findings.clone());
        self.ctx.recorder.state_changed(state);

        Ok(InvestigationOutcome {
            strategies,
            findings,
        })
    }

    async fn investigate(
        &self,
        session_id: Uuid,
        query: &str,
        strategy: &InvestigationStrategy,
    ) -> StrategyOutcome {
        let mut report = StrategyReport {
            question: strategy.question.clone(),
            ..Default::default()
        };

        let prompt = prompts::strategy_queries(query, strategy, self.ctx.config.strategy_query_count);
        let queries = match self
            .ctx
            .llm
            .complete_structured::<QueryList>(
                session_id,
                tags::STRATEGY_QUERIES,
                &prompt,
                &prompts::query_list_schema(),
            )
            .await
        {
            Ok(list) => list.into_clean(),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    strategy = %strategy.question,
                    error = %e,
                    "Strategy query generation failed; skipping strategy"
                );
                return StrategyOutcome::empty(report);
            }
        };
        report.queries = queries.len();

        let searched = self.ctx.search_many(&queries).await;
        let mut candidates = interleave_by_rank(&searched);
        candidates.truncate(self.ctx.config.max_results_per_strategy);
        let search_results: Vec<SearchResult> = searched
            .into_iter()
            .flat_map(|(_, results)| results)
            .collect();
        report.results = candidates.len();

        let pages = self.fetch_all(candidates).await;
        report.fetched = pages.len();
        let web_contents = pages.iter().map(|p| p.body.clone()).collect();

        let relevant = self.judge_all(session_id, query, strategy, pages).await;
        report.relevant = relevant.len();

        let findings = self.extract_all(session_id, relevant).await;
        report.findings = findings.len();

        debug!(
            session_id = %session_id,
            strategy = %strategy.question,
            queries = report.queries,
            results = report.results,
            fetched = report.fetched,
            relevant = report.relevant,
            findings = report.findings,
            "Strategy investigated"
        );
        self.ctx.callback.on_progress(&format!(
            "Investigated \"{}\": {} findings from {} relevant pages",
            strategy.question, report.findings, report.relevant
        ));

        StrategyOutcome {
            report,
            search_results,
            web_contents,
            findings,
        }
    }

    /// Fetch every candidate; drop failures and bodies below the length floor.
    async fn fetch_all(&self, candidates: Vec<Candidate>) -> Vec<FetchedPage> {
        let options = FetchOptions {
            max_length: self.ctx.config.fetch_max_length,
            start_index: 0,
        };
        let min_length = self.ctx.config.min_content_length;

        let fetches = candidates.into_iter().map(|candidate| async move {
            let result = self.ctx.fetcher.fetch(&candidate.url, options).await;
            (candidate, result)
        });

        join_all(fetches)
            .await
            .into_iter()
            .filter_map(|(candidate, result)| match result {
                Ok(body) if body.chars().count() >= min_length => {
                    Some(FetchedPage { candidate, body })
                }
                Ok(body) => {
                    debug!(
                        url = %candidate.url,
                        chars = body.chars().count(),
                        "Dropping short page"
                    );
                    None
                }
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Fetch failed; dropping page");
                    None
                }
            })
            .collect()
    }

    /// Keep only pages the model judges relevant.
    async fn judge_all(
        &self,
        session_id: Uuid,
        query: &str,
        strategy: &InvestigationStrategy,
        pages: Vec<FetchedPage>,
    ) -> Vec<FetchedPage> {
        let schema = prompts::relevance_schema();
        let judgments = pages.into_iter().map(|page| {
            let schema = &schema;
            async move {
                let prompt = prompts::relevance(
                    query,
                    &strategy.question,
                    &page.candidate.query,
                    &page.body,
                );
                let verdict = self
                    .ctx
                    .llm
                    .complete_structured::<RelevanceJudgment>(
                        session_id,
                        tags::RELEVANCE,
                        &prompt,
                        schema,
                    )
                    .await;
                (page, verdict)
            }
        });

        join_all(judgments)
            .await
            .into_iter()
            .filter_map(|(page, verdict)| match verdict {
                Ok(judgment) if judgment.relevant => Some(page),
                Ok(judgment) => {
                    debug!(
                        url = %page.candidate.url,
                        title = %page.candidate.title,
                        reason = judgment.reason.as_deref().unwrap_or(""),
                        "Page judged not relevant"
                    );
                    None
                }
                Err(e) => {
                    warn!(url = %page.candidate.url, error = %e, "Relevance judgment failed; dropping page");
                    None
                }
            })
            .collect()
    }

    /// One finding per successful extraction, sourced from the page URL.
    async fn extract_all(&self, session_id: Uuid, pages: Vec<FetchedPage>) -> Vec<Finding> {
        let extractions = pages.into_iter().map(|page| async move {
            let prompt = prompts::extraction(&page.candidate.url, &page.body);
            let extracted = self
                .ctx
                .llm
                .complete_text(session_id, tags::EXTRACTION, &prompt)
                .await;
            (page.candidate, extracted)
        });

        join_all(extractions)
            .await
            .into_iter()
            .filter_map(|(candidate, extracted)| match extracted {
                Ok(text) if !text.trim().is_empty() => {
                    Some(Finding::new(text.trim(), candidate.url))
                }
                Ok(_) => {
                    debug!(url = %candidate.url, "Extraction returned no content");
                    None
                }
                Err(e) => {
                    warn!(url = %candidate.url, error = %e, "Extraction failed; dropping page");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits(urls: &[&str]) -> Vec<SearchResult> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| SearchResult {
                title: format!("Title {i}"),
                url: url.to_string(),
                snippet: String::new(),
                position: i + 1,
            })
            .collect()
    }

    #[test]
    fn test_interleave_by_rank_shares_ceiling_between_queries() {
        let searched = vec![
            ("first".to_string(), hits(&["a1", "a2", "a3", "a4"])),
            ("second".to_string(), Vec::new()),
            ("third".to_string(), hits(&["c1", "c2"])),
        ];
        let mut candidates = interleave_by_rank(&searched);
        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["a1", "c1", "a2", "c2", "a3", "a4"]);

        candidates.truncate(3);
        let queries: Vec<&str> = candidates.iter().map(|c| c.query.as_str()).collect();
        assert_eq!(queries, vec!["first", "third", "first"]);
    }

    #[test]
    fn test_interleave_by_rank_empty() {
        assert!(interleave_by_rank(&[]).is_empty());
        assert!(interleave_by_rank(&[("q".to_string(), Vec::new())]).is_empty());
    }
}
