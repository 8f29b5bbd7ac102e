//! Phase 4: synthesis of the accumulated findings into the final report.

use super::context::PhaseContext;
use super::prompts::{self, FINDING_SEPARATOR, tags};
use super::report::{ResearchReport, SynthesisOutput};
use super::state::{ResearchPhase, ResearchState};
use crate::error::ResearchError;
use tracing::info;

pub struct Synthesis<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> Synthesis<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, state: &mut ResearchState) -> Result<ResearchReport, ResearchError> {
        self.ctx.enter(state, ResearchPhase::Synthesizing)?;

        let prompt = prompts::synthesis(
            state.query(),
            &state.findings_text(FINDING_SEPARATOR),
            state.research_plan.as_ref(),
        );
        let output: SynthesisOutput = self
            .ctx
            .llm
            .complete_structured(
                state.session_id(),
                tags::SYNTHESIS,
                &prompt,
                &prompts::synthesis_schema(),
            )
            .await?;

        let report = ResearchReport::from_synthesis(state, &output);
        info!(
            session_id = %state.session_id(),
            findings = report.metadata.findings_count,
            sources = report.sources.len(),
            "Synthesis complete"
        );

        state.report = Some(report.clone());
        self.ctx.recorder.state_changed(state);
        Ok(report)
    }
}
