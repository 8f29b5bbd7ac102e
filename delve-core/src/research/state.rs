//! Research state: the single mutable record of one research run.

use super::report::ResearchReport;
use super::sources::SearchResult;
use crate::error::ResearchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag used when a finding cannot be traced to a URL.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Current phase of a research run.
///
/// Phases advance strictly in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchPhase {
    /// Initial keyword search.
    Searching,
    /// Gap identification and plan generation.
    Planning,
    /// Per-strategy fan-out investigation.
    Investigating,
    /// Final report synthesis.
    Synthesizing,
}

impl ResearchPhase {
    pub const ALL: [ResearchPhase; 4] = [
        ResearchPhase::Searching,
        ResearchPhase::Planning,
        ResearchPhase::Investigating,
        ResearchPhase::Synthesizing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchPhase::Searching => "searching",
            ResearchPhase::Planning => "planning",
            ResearchPhase::Investigating => "investigating",
            ResearchPhase::Synthesizing => "synthesizing",
        }
    }

    /// The phase that follows this one, if any.
    pub fn next(&self) -> Option<ResearchPhase> {
        match self {
            ResearchPhase::Searching => Some(ResearchPhase::Planning),
            ResearchPhase::Planning => Some(ResearchPhase::Investigating),
            ResearchPhase::Investigating => Some(ResearchPhase::Synthesizing),
            ResearchPhase::Synthesizing => None,
        }
    }

    /// A phase may be re-entered (idempotent marker) or advanced by exactly one step.
    pub fn can_transition_to(&self, to: ResearchPhase) -> bool {
        *self == to || self.next() == Some(to)
    }
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic unit of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    /// The only field synthesis reads.
    pub content: String,
    /// A URL when traceable, otherwise [`UNKNOWN_SOURCE`].
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            source: if source.trim().is_empty() {
                UNKNOWN_SOURCE.to_string()
            } else {
                source
            },
            timestamp: Utc::now(),
        }
    }
}

/// One planned line of inquiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestigationStrategy {
    pub question: String,
    /// Free-text guidance, used only as prompt context.
    #[serde(default)]
    pub approach: String,
    /// Source hints, used only as prompt context.
    #[serde(default)]
    pub expected_sources: Vec<String>,
}

/// The plan produced by the planning phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPlan {
    pub research_questions: Vec<String>,
    pub investigation_strategies: Vec<InvestigationStrategy>,
    pub synthesis_strategy: String,
}

/// The mutable aggregate for one research run.
///
/// Collections are append-only. Only the executing phase mutates the state,
/// and only between fan-out batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    session_id: Uuid,
    query: String,
    current_phase: ResearchPhase,
    pub search_results: Vec<SearchResult>,
    pub web_contents: Vec<String>,
    findings: Vec<Finding>,
    pub research_plan: Option<ResearchPlan>,
    pub follow_up_queries: Vec<String>,
    pub report: Option<ResearchReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchState {
    /// Create a fresh state in the `searching` phase.
    pub fn new(query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            query: query.into(),
            current_phase: ResearchPhase::Searching,
            search_results: Vec::new(),
            web_contents: Vec::new(),
            findings: Vec::new(),
            research_plan: None,
            follow_up_queries: Vec::new(),
            report: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn current_phase(&self) -> ResearchPhase {
        self.current_phase
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Move to `to`, rejecting regressions and skipped phases.
    pub fn transition(&mut self, to: ResearchPhase) -> Result<(), ResearchError> {
        if !self.current_phase.can_transition_to(to) {
            return Err(ResearchError::InvalidTransition {
                from: self.current_phase.to_string(),
                to: to.to_string(),
            });
        }
        self.current_phase = to;
        self.touch();
        Ok(())
    }

    pub fn append_findings(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
        self.touch();
    }

    pub fn append_search_results(&mut self, results: impl IntoIterator<Item = SearchResult>) {
        self.search_results.extend(results);
        self.touch();
    }

    /// Finding contents joined with `separator`, in finding order.
    pub fn findings_text(&self, separator: &str) -> String {
        self.findings
            .iter()
            .map(|f| f.content.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
