//! Markdown Report Generator
//!
//! Generates documentation-friendly Markdown reports.

use anyhow::Result;

use crate::analysis::Verdict;
use crate::reporting::ProbeReport;

/// Generate Markdown report
pub fn generate(report: &ProbeReport) -> Result<String> {
    let mut md = String::new();

    // Title
    md.push_str(&format!("# {}\n\n", report.metadata.title));

    // Metadata
    md.push_str("## Report Information\n\n");
    md.push_str(&format!(
        "- **Campaign Period:** {} to {}\n",
        report.metadata.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
        report.metadata.end_time.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("- **Seed:** `{}`\n", report.metadata.seed));
    md.push_str(&format!(
        "- **Batch Sizes:** {}\n",
        report
            .metadata
            .batch_sizes
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    md.push_str(&format!("- **Tool Version:** {}\n\n", report.metadata.tool_version));

    if let Some(notes) = &report.metadata.notes {
        md.push_str(&format!("> {}\n\n", notes));
    }

    // Summary
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Probes | {} |\n", report.summary.probes));
    md.push_str(&format!("| Flagged | {} |\n", report.summary.flagged));
    md.push_str(&format!("| Not Flagged | {} |\n", report.summary.not_flagged));
    md.push_str(&format!("| Inconclusive | {} |\n", report.summary.inconclusive));
    md.push_str(&format!("| Failed Jobs | {} |\n", report.summary.failed_jobs));
    md.push_str(&format!("| Circuit Breaker Trips | {} |\n", report.summary.breaker_trips));
    md.push_str(&format!(
        "| Requests | {} ({} failed) |\n",
        report.summary.total_requests, report.summary.failed_requests
    ));
    md.push_str(&format!("| Duration | {}s |\n\n", report.summary.duration_secs));

    // Overview
    md.push_str("## Verdicts\n\n");
    md.push_str("| Target | Algorithm | Verdict | Growth | Confidence |\n");
    md.push_str("|--------|-----------|---------|--------|------------|\n");

    for verdict in &report.verdicts {
        md.push_str(&format!(
            "| `{}` | {} | {} | {} | {:.2} ({}) |\n",
            verdict.target,
            md_escape(&verdict.algorithm),
            verdict.label(),
            growth(verdict),
            verdict.confidence,
            verdict.confidence_level
        ));
    }
    md.push('\n');

    // Detail
    md.push_str("## Ladder Details\n\n");
    for verdict in &report.verdicts {
        md.push_str(&format!(
            "### `{}` ({})\n\n",
            verdict.target,
            md_escape(&verdict.algorithm)
        ));
        md.push_str(&format!("**Outcome:** {}\n\n", verdict.outcome.name()));
        if let Some(exponent) = verdict.growth_exponent {
            md.push_str(&format!("**Fitted exponent:** {:.2}\n\n", exponent));
        }
        if let Some(step) = verdict.steepest_growth() {
            md.push_str(&format!(
                "**Steepest step:** {} to {} keys, {:.1}x latency (threshold {:.1}x)\n\n",
                step.from_batch, step.to_batch, step.ratio, step.threshold
            ));
        }

        md.push_str("| Step | Batch Size | Samples | Successes | Median (ms) |\n");
        md.push_str("|------|------------|---------|-----------|-------------|\n");
        for step in &verdict.steps {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                step.step,
                step.batch_size,
                step.samples,
                step.successes,
                step.median_ms.map(|m| format!("{:.3}", m)).unwrap_or_else(|| "-".to_string())
            ));
        }
        md.push_str("\n---\n\n");
    }

    if !report.failures.is_empty() {
        md.push_str("## Failed Jobs\n\n");
        for failure in &report.failures {
            md.push_str(&format!(
                "- `{}` ({}): {}\n",
                failure.target,
                md_escape(&failure.algorithm),
                md_escape(&failure.error)
            ));
        }
        md.push('\n');
    }

    // Footer
    md.push_str(&format!(
        "\n*Report generated by hashprobe v{} on {}*\n",
        report.metadata.tool_version,
        report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    Ok(md)
}

fn growth(verdict: &Verdict) -> String {
    match (verdict.growth_ratio, verdict.batch_factor) {
        (Some(ratio), Some(k)) => format!("{:.1}x over {:.0}x keys", ratio, k),
        _ => "-".to_string(),
    }
}

/// Escape special Markdown characters
fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('*', "\\*")
        .replace('_', "\\_")
}
