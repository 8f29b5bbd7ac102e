//! Phase 2: knowledge-gap identification and plan generation.

use super::context::PhaseContext;
use super::prompts::{self, tags};
use super::state::{ResearchPhase, ResearchPlan, ResearchState};
use crate::error::ResearchError;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub gaps: Vec<String>,
    pub plan: ResearchPlan,
}

pub struct Planning<'a> {
    ctx: &'a PhaseContext,
}

impl<'a> Planning<'a> {
    pub fn new(ctx: &'a PhaseContext) -> Self {
        Self { ctx }
    }

    /// Two sequential calls: the plan prompt depends on the gap list.
    pub async fn execute(&self, state: &mut ResearchState) -> Result<PlanningOutcome, ResearchError> {
        self.ctx.enter(state, ResearchPhase::Planning)?;
        let session_id = state.session_id();
        let findings = state.findings_text("\n");

        let gaps_text = self
            .ctx
            .llm
            .complete_text(
                session_id,
                tags::KNOWLEDGE_GAPS,
                &prompts::knowledge_gaps(state.query(), &findings),
            )
            .await?;
        let gaps = parse_gaps(&gaps_text);
        debug!(session_id = %session_id, gaps = gaps.len(), "Knowledge gaps identified");
        self.ctx
            .callback
            .on_progress(&format!("Identified {} knowledge gaps", gaps.len()));

        let plan: ResearchPlan = self
            .ctx
            .llm
            .complete_structured(
                session_id,
                tags::RESEARCH_PLAN,
                &prompts::research_plan(state.query(), &findings, &gaps),
                &prompts::research_plan_schema(),
            )
            .await?;

        info!(
            session_id = %session_id,
            questions = plan.research_questions.len(),
            strategies = plan.investigation_strategies.len(),
            "Research plan generated"
        );

        state.research_plan = Some(plan.clone());
        self.ctx.recorder.state_changed(state);

        Ok(PlanningOutcome { gaps, plan })
    }
}

/// One gap per non-empty line.
pub fn parse_gaps(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gaps() {
        let gaps = parse_gaps("Benchmarks under load\n\n  Cancellation semantics  \n\r\nio_uring support\n");
        assert_eq!(
            gaps,
            vec!["Benchmarks under load", "Cancellation semantics", "io_uring support"]
        );
        assert!(parse_gaps("\n \n").is_empty());
    }
}
