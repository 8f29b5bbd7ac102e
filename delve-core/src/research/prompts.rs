//! Prompt builders and output schemas for the research phases.

use super::state::{InvestigationStrategy, ResearchPlan};
use crate::brain::StructuredSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Recorder tags, one per kind of call.
pub mod tags {
    pub const INITIAL_QUERIES: &str = "initial_queries";
    pub const KNOWLEDGE_GAPS: &str = "knowledge_gaps";
    pub const RESEARCH_PLAN: &str = "research_plan";
    pub const STRATEGY_QUERIES: &str = "strategy_queries";
    pub const RELEVANCE: &str = "relevance";
    pub const EXTRACTION: &str = "extraction";
    pub const SYNTHESIS: &str = "synthesis";
}

/// Separator placed between findings in the synthesis prompt.
pub const FINDING_SEPARATOR: &str = "\n\n---\n\n";

/// `{queries: [string]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryList {
    pub queries: Vec<String>,
}

impl QueryList {
    /// Trimmed, non-empty queries in the order the model gave them.
    pub fn into_clean(self) -> Vec<String> {
        self.queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect()
    }
}

/// A strict yes/no admission decision for one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceJudgment {
    pub relevant: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

pub fn query_list_schema() -> StructuredSchema {
    StructuredSchema::new(
        "search_queries",
        json!({
            "type": "object",
            "properties": {
                "queries": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["queries"]
        }),
    )
}

pub fn research_plan_schema() -> StructuredSchema {
    StructuredSchema::new(
        "research_plan",
        json!({
            "type": "object",
            "properties": {
                "researchQuestions": { "type": "array", "items": { "type": "string" } },
                "investigationStrategies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": { "type": "string" },
                            "approach": { "type": "string" },
                            "expectedSources": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["question", "approach", "expectedSources"]
                    }
                },
                "synthesisStrategy": { "type": "string" }
            },
            "required": ["researchQuestions", "investigationStrategies", "synthesisStrategy"]
        }),
    )
}

pub fn relevance_schema() -> StructuredSchema {
    StructuredSchema::new(
        "relevance_judgment",
        json!({
            "type": "object",
            "properties": {
                "relevant": { "type": "boolean" },
                "reason": { "type": "string" }
            },
            "required": ["relevant"]
        }),
    )
}

pub fn synthesis_schema() -> StructuredSchema {
    StructuredSchema::new(
        "research_synthesis",
        json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "content": { "type": "string" },
                "keyInsights": { "type": "array", "items": { "type": "string" } },
                "conclusions": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["summary", "content", "keyInsights", "conclusions"]
        }),
    )
}

pub fn initial_queries(query: &str, (min, max): (usize, usize)) -> String {
    format!(
        "You are planning the first round of web searches for a research task.\n\n\
         Research topic: {query}\n\n\
         Generate between {min} and {max} short keyword-style web search queries that together \
         cover distinct facets of the topic. Use search-engine keywords, not full sentences or \
         questions. Do not repeat the same facet twice."
    )
}

pub fn knowledge_gaps(query: &str, findings: &str) -> String {
    format!(
        "You are reviewing preliminary research.\n\n\
         Research topic: {query}\n\n\
         Findings so far:\n{findings}\n\n\
         List the knowledge gaps that remain: important aspects of the topic the findings do \
         not yet answer. Write exactly one gap per line with no numbering and no other text."
    )
}

pub fn research_plan(query: &str, findings: &str, gaps: &[String]) -> String {
    let gaps = if gaps.is_empty() {
        "(none identified)".to_string()
    } else {
        gaps.iter()
            .map(|g| format!("- {g}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "Create a research plan for an in-depth investigation.\n\n\
         Research topic: {query}\n\n\
         Findings so far:\n{findings}\n\n\
         Knowledge gaps:\n{gaps}\n\n\
         Produce the research questions to answer, one investigation strategy per line of \
         inquiry (each with its question, the approach to take, and the kinds of sources \
         expected to help), and a strategy for synthesizing the final report."
    )
}

pub fn strategy_queries(
    query: &str,
    strategy: &InvestigationStrategy,
    (min, max): (usize, usize),
) -> String {
    let expected = if strategy.expected_sources.is_empty() {
        "any".to_string()
    } else {
        strategy.expected_sources.join(", ")
    };
    format!(
        "Generate between {min} and {max} specialized keyword search queries for the following \
         investigation strategy.\n\n\
         Research topic: {query}\n\
         Strategy question: {question}\n\
         Approach: {approach}\n\
         Expected sources: {expected}\n\n\
         Use search-engine keywords, not full sentences. Each query should target a different \
         angle of the strategy question.",
        question = strategy.question,
        approach = strategy.approach,
    )
}

pub fn relevance(query: &str, strategy_question: &str, search_query: &str, content: &str) -> String {
    format!(
        "Judge strictly whether the content below is relevant to the research.\n\n\
         Research topic: {query}\n\
         Strategy question: {strategy_question}\n\
         Search query: {search_query}\n\n\
         Mark the content relevant only if it substantively addresses the strategy question. \
         Marketing pages, link lists, and tangential material are not relevant.\n\n\
         <content>\n{content}\n</content>"
    )
}

pub fn extraction(url: &str, content: &str) -> String {
    format!(
        "Extract the substantive main content from the page text below. Remove navigation, \
         cookie notices, advertisements, footers, and other boilerplate. Keep facts, figures, \
         and explanations intact. Reply with the extracted text only.\n\n\
         Page: {url}\n\n\
         <content>\n{content}\n</content>"
    )
}

pub fn synthesis(query: &str, findings: &str, plan: Option<&ResearchPlan>) -> String {
    let guidance = plan
        .map(|p| p.synthesis_strategy.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or("Organize the findings into a coherent, well-structured answer.");
    format!(
        "Synthesize the findings below into a research report.\n\n\
         Research topic: {query}\n\
         Synthesis strategy: {guidance}\n\n\
         Each finding is separated by a line containing only ---.\n\n\
         Findings:\n{findings}\n\n\
         Write a concise summary, a detailed markdown analysis, the key insights, and the \
         conclusions. Base every statement on the findings."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_list_into_clean() {
        let list = QueryList {
            queries: vec![" rust async ".into(), "".into(), "   ".into(), "tokio vs smol".into()],
        };
        assert_eq!(list.into_clean(), vec!["rust async", "tokio vs smol"]);
    }

    #[test]
    fn test_strategy_prompt_carries_context() {
        let strategy = InvestigationStrategy {
            question: "How do executors schedule tasks?".into(),
            approach: "Read runtime internals docs".into(),
            expected_sources: vec!["docs.rs".into(), "blog posts".into()],
        };
        let prompt = strategy_queries("async runtimes", &strategy, (2, 3));
        assert!(prompt.contains("between 2 and 3"));
        assert!(prompt.contains("Strategy question: How do executors schedule tasks?"));
        assert!(prompt.contains("docs.rs, blog posts"));
    }

    #[test]
    fn test_synthesis_prompt_falls_back_without_plan() {
        let prompt = synthesis("q", "f", None);
        assert!(prompt.contains("Organize the findings"));
    }

    #[test]
    fn test_relevance_judgment_reason_optional() {
        let judgment: RelevanceJudgment = serde_json::from_str(r#"{"relevant": false}"#).unwrap();
        assert!(!judgment.relevant);
        assert!(judgment.reason.is_none());
    }
}
