//! Markdown rendering of a persisted [`RiskSignals`] mapping.
//!
//! The report is what a reviewer sees on a case: the statistical indicators
//! first, then free-form narrative commentary when one was produced elsewhere.

use std::fmt::Write;

use fraudex_core::RiskSignals;

/// Render `signals` (and an optional narrative) as a markdown report.
pub fn format_report(signals: &RiskSignals, narrative: Option<&str>) -> String {
    let mut out = String::from("## Risk Analysis Report\n\n### Statistical Indicators\n\n");

    let _ = writeln!(out, "- **Risk Level**: {}", signals.risk_level);
    let _ = writeln!(out, "- **Confidence**: {:.0}%", signals.confidence * 100.0);

    out.push_str("- **Top Factors**:");
    if signals.top_factors.is_empty() {
        out.push_str(" None\n");
    } else {
        out.push('\n');
        for (i, factor) in signals.top_factors.iter().enumerate() {
            let _ = writeln!(
                out,
                "\n**{}. {}** (Score: {:.1}, Confidence: {:.0}%)",
                i + 1,
                title_case(&factor.detector),
                factor.score_contribution,
                factor.confidence * 100.0
            );
            if !factor.explanation.is_empty() {
                let _ = writeln!(out, "   - {}", factor.explanation);
            }
        }
    }

    out.push_str("- **Recommendations**:");
    if signals.recommendations.is_empty() {
        out.push_str(" None\n");
    } else {
        out.push('\n');
        for recommendation in &signals.recommendations {
            let _ = writeln!(out, "  - {recommendation}");
        }
    }

    out.push_str("\n**Detector Breakdown:**\n");
    // BTreeMap iteration is already sorted by name.
    let triggered: Vec<String> = signals
        .detector_breakdown
        .iter()
        .filter(|(_, b)| b.score > 0.0)
        .map(|(name, b)| format!("  - **{}**: Score {:.1}", title_case(name), b.score))
        .collect();
    if triggered.is_empty() {
        out.push_str("No detectors triggered\n");
    } else {
        out.push_str(&triggered.join("\n"));
        out.push('\n');
    }

    if let Some(text) = narrative.map(str::trim).filter(|t| !t.is_empty()) {
        let _ = write!(out, "\n### Narrative Analysis\n\n{text}\n");
    }
    out
}

/// `split_invoice` -> `Split Invoice`.
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
