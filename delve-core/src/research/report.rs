//! Research report assembly.

use super::state::{Finding, ResearchState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Executive summary used when a run could not be completed.
pub const DEGRADED_NOTICE: &str =
    "Research could not be completed. The findings gathered before the failure are listed below.";

/// The object the synthesis phase asks the model to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisOutput {
    pub summary: String,
    pub content: String,
    pub key_insights: Vec<String>,
    pub conclusions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub findings_count: usize,
    pub sources_consulted: usize,
}

/// The terminal artifact of a research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub query: String,
    pub executive_summary: String,
    pub detailed_findings: String,
    /// Deduplicated URLs in first-seen order.
    pub sources: Vec<String>,
    pub metadata: ReportMetadata,
}

impl ResearchReport {
    /// Build the completed report from a synthesis output.
    pub fn from_synthesis(state: &ResearchState, output: &SynthesisOutput) -> Self {
        let sources = collect_sources(state.findings());
        Self {
            query: state.query().to_string(),
            executive_summary: output.summary.clone(),
            detailed_findings: render_markdown(output, &sources),
            sources,
            metadata: metadata(state),
        }
    }

    /// Build a best-effort report from whatever the state holds.
    pub fn degraded(state: &ResearchState) -> Self {
        Self {
            query: state.query().to_string(),
            executive_summary: DEGRADED_NOTICE.to_string(),
            detailed_findings: state.findings_text("\n"),
            sources: collect_sources(state.findings()),
            metadata: metadata(state),
        }
    }
}

fn metadata(state: &ResearchState) -> ReportMetadata {
    ReportMetadata {
        findings_count: state.findings().len(),
        sources_consulted: state.web_contents.len(),
    }
}

/// Ordered set of the http(s) sources cited by `findings`.
///
/// Exact string match; the first occurrence fixes the position.
pub fn collect_sources(findings: &[Finding]) -> Vec<String> {
    dedup_ordered(
        findings
            .iter()
            .map(|f| f.source.as_str())
            .filter(|s| is_web_url(s)),
    )
}

/// Deduplicate by exact string, keeping first-seen order.
pub fn dedup_ordered<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(*item))
        .map(str::to_string)
        .collect()
}

fn is_web_url(source: &str) -> bool {
    url::Url::parse(source)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Assemble the markdown body of a completed report.
pub fn render_markdown(output: &SynthesisOutput, sources: &[String]) -> String {
    let mut out = String::new();
    out.push_str("## Summary\n\n");
    out.push_str(output.summary.trim());
    out.push_str("\n\n## Analysis\n\n");
    out.push_str(output.content.trim());
    out.push('\n');

    if !output.key_insights.is_empty() {
        out.push_str("\n## Key Insights\n\n");
        for (i, insight) in output.key_insights.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, insight.trim()));
        }
    }

    if !output.conclusions.is_empty() {
        out.push_str("\n## Conclusions\n\n");
        for (i, conclusion) in output.conclusions.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, conclusion.trim()));
        }
    }

    if !sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for source in sources {
            out.push_str(&format!("- {source}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output() -> SynthesisOutput {
        SynthesisOutput {
            summary: "Tokio dominates.".into(),
            content: "Most crates target tokio.".into(),
            key_insights: vec!["Ecosystem lock-in".into(), "io_uring is emerging".into()],
            conclusions: vec!["Pick tokio".into()],
        }
    }

    #[test]
    fn test_collect_sources_dedups_and_skips_tags() {
        let findings = vec![
            Finding::new("a", "https://tokio.rs"),
            Finding::new("b", "unknown"),
            Finding::new("c", "https://async.rs"),
            Finding::new("d", "https://tokio.rs"),
            Finding::new("e", "ftp://files.example.com"),
        ];
        assert_eq!(
            collect_sources(&findings),
            vec!["https://tokio.rs".to_string(), "https://async.rs".to_string()]
        );
    }

    #[test]
    fn test_render_markdown_sections() {
        let md = render_markdown(&output(), &["https://tokio.rs".to_string()]);
        assert_eq!(
            md,
            "## Summary\n\nTokio dominates.\n\n## Analysis\n\nMost crates target tokio.\n\n\
             ## Key Insights\n\n1. Ecosystem lock-in\n2. io_uring is emerging\n\n\
             ## Conclusions\n\n1. Pick tokio\n\n## Sources\n\n- https://tokio.rs\n"
        );
    }

    #[test]
    fn test_render_markdown_omits_empty_lists() {
        let out = SynthesisOutput {
            key_insights: vec![],
            conclusions: vec![],
            ..output()
        };
        let md = render_markdown(&out, &[]);
        assert!(!md.contains("Key Insights"));
        assert!(!md.contains("Conclusions"));
        assert!(!md.contains("Sources"));
    }

    #[test]
    fn test_degraded_report_from_state() {
        let mut state = ResearchState::new("async runtimes");
        state.append_findings([
            Finding::new("first", "https://a.example"),
            Finding::new("second", "https://b.example"),
        ]);
        state.web_contents.push("page".into());

        let report = ResearchReport::degraded(&state);
        assert_eq!(report.executive_summary, DEGRADED_NOTICE);
        assert_eq!(report.detailed_findings, "first\nsecond");
        assert_eq!(report.metadata.findings_count, 2);
        assert_eq!(report.metadata.sources_consulted, 1);
        assert_eq!(report.sources.len(), 2);
    }

    #[test]
    fn test_synthesis_output_accepts_camel_case() {
        let out: SynthesisOutput = serde_json::from_str(
            r#"{"summary":"s","content":"c","keyInsights":["k"],"conclusions":[]}"#,
        )
        .unwrap();
        assert_eq!(out.key_insights, vec!["k".to_string()]);
    }

    #[test]
    fn test_synthesis_output_requires_lists() {
        let missing_lists = r#"{"summary":"s","content":"c"}"#;
        assert!(serde_json::from_str::<SynthesisOutput>(missing_lists).is_err());
    }
}
