//! Research engine: sequences the four phases and owns the failure envelope.

use super::callback::{NoOpResearchCallback, ResearchCallback};
use super::context::PhaseContext;
use super::initial_search::InitialSearch;
use super::investigation::Investigation;
use super::planning::Planning;
use super::recorder::{RecorderHandle, SessionRecorder};
use super::report::ResearchReport;
use super::sources::{ContentFetcher, SearchGateway};
use super::state::ResearchState;
use super::synthesis::Synthesis;
use crate::brain::{CompletionService, LlmProvider};
use crate::config::ResearchConfig;
use crate::error::ResearchError;
use std::sync::Arc;
use tracing::{error, info};

/// The main research engine that orchestrates the 4-phase pipeline.
///
/// Each run owns a fresh [`ResearchState`]; the engine itself holds only
/// stateless collaborators and may serve concurrent runs.
pub struct ResearchEngine {
    provider: Arc<dyn LlmProvider>,
    search: Arc<dyn SearchGateway>,
    fetcher: Arc<dyn ContentFetcher>,
    config: ResearchConfig,
    recorder: RecorderHandle,
    callback: Arc<dyn ResearchCallback>,
    temperature: f32,
    max_tokens: Option<usize>,
}

impl ResearchEngine {
    /// Create a new research engine that records nothing and reports no progress.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchGateway>,
        fetcher: Arc<dyn ContentFetcher>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            provider,
            search,
            fetcher,
            config,
            recorder: RecorderHandle::disabled(),
            callback: Arc::new(NoOpResearchCallback),
            temperature: 0.3,
            max_tokens: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = RecorderHandle::new(recorder);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Generation parameters for every completion the run makes.
    pub fn with_generation(mut self, temperature: f32, max_tokens: Option<usize>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Research `query` and return the final or degraded report. Never fails.
    pub async fn run(&self, query: &str) -> ResearchReport {
        self.run_with_state(query).await.0
    }

    /// Like [`run`](Self::run), also returning the final state of the run.
    pub async fn run_with_state(&self, query: &str) -> (ResearchReport, ResearchState) {
        let ctx = self.context();
        let mut state = ResearchState::new(query);
        info!(session_id = %state.session_id(), query, "Starting research run");
        ctx.recorder.state_changed(&state);

        let report = match Self::execute(&ctx, &mut state).await {
            Ok(report) => report,
            Err(e) => {
                error!(
                    session_id = %state.session_id(),
                    phase = %state.current_phase(),
                    findings = state.findings().len(),
                    error = %e,
                    "Research phase failed; returning degraded report"
                );
                ctx.callback.on_degraded(&e);
                ctx.recorder.state_changed(&state);
                ResearchReport::degraded(&state)
            }
        };

        (report, state)
    }

    async fn execute(
        ctx: &PhaseContext,
        state: &mut ResearchState,
    ) -> Result<ResearchReport, ResearchError> {
        InitialSearch::new(ctx).execute(state).await?;
        Planning::new(ctx).execute(state).await?;
        Investigation::new(ctx).execute(state).await?;
        Synthesis::new(ctx).execute(state).await
    }

    fn context(&self) -> PhaseContext {
        let llm = CompletionService::new(self.provider.clone())
            .with_recorder(self.recorder.clone())
            .with_generation(self.temperature, self.max_tokens);
        PhaseContext {
            llm,
            search: self.search.clone(),
            fetcher: self.fetcher.clone(),
            recorder: self.recorder.clone(),
            callback: self.callback.clone(),
            config: self.config.clone(),
        }
    }
}
