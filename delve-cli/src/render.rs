//! Terminal rendering for reports and session listings.

use delve_core::research::{ResearchReport, SessionSummary};

/// Default width of the report block.
pub const REPORT_WIDTH: usize = 88;

const QUERY_PREVIEW_CHARS: usize = 48;

/// Render a report as a bordered text block.
pub fn report_block(report: &ResearchReport, degraded: bool, width: usize) -> String {
    let width = width.max(24);
    let inner = width - 2;
    let rule = "─".repeat(width - 1);
    let mut out = String::new();

    out.push_str(&format!("┌{}\n", rule));
    let heading = if degraded {
        format!("Research (incomplete): {}", report.query)
    } else {
        format!("Research: {}", report.query)
    };
    push_wrapped(&mut out, &heading, inner);

    out.push_str(&format!("├{}\n", rule));
    push_wrapped(&mut out, &report.executive_summary, inner);

    if !report.detailed_findings.trim().is_empty() {
        out.push_str(&format!("├{}\n", rule));
        push_wrapped(&mut out, &report.detailed_findings, inner);
    }

    // The synthesized markdown already lists its sources.
    if degraded && !report.sources.is_empty() {
        out.push_str(&format!("├{}\n", rule));
        out.push_str("│ Sources\n");
        for (i, source) in report.sources.iter().enumerate() {
            push_wrapped(&mut out, &format!("{:>3}. {}", i + 1, source), inner);
        }
    }

    out.push_str(&format!("├{}\n", rule));
    push_wrapped(
        &mut out,
        &format!(
            "{} findings · {} sources cited · {} pages consulted",
            report.metadata.findings_count,
            report.sources.len(),
            report.metadata.sources_consulted
        ),
        inner,
    );
    out.push_str(&format!("└{}\n", rule));
    out
}

fn push_wrapped(out: &mut String, text: &str, width: usize) {
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push_str("│\n");
            continue;
        }
        for wrapped in textwrap::wrap(line, width) {
            out.push_str("│ ");
            out.push_str(wrapped.trim_end());
            out.push('\n');
        }
    }
}

/// Render the session listing as an aligned table.
pub fn sessions_table(sessions: &[SessionSummary]) -> String {
    let mut out = format!(
        "{:<36}  {:<13}  {:>8}  {:<6}  {}\n",
        "SESSION", "PHASE", "FINDINGS", "REPORT", "QUERY"
    );
    for session in sessions {
        out.push_str(&format!(
            "{:<36}  {:<13}  {:>8}  {:<6}  {}\n",
            session.session_id,
            session.phase.as_str(),
            session.findings,
            if session.has_report { "yes" } else { "no" },
            preview(&session.query, QUERY_PREVIEW_CHARS)
        ));
    }
    out
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
