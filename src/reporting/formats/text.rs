//! Plain text report for the terminal

use anyhow::Result;
use std::fmt::Write;

use crate::reporting::ProbeReport;

pub fn generate(report: &ProbeReport) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "{}", report.metadata.title)?;
    writeln!(out, "{}", "=".repeat(report.metadata.title.len()))?;
    writeln!(out)?;

    for verdict in &report.verdicts {
        writeln!(out, "{} [{}]", verdict.target, verdict.algorithm)?;
        writeln!(out, "  verdict:    {}", verdict.label())?;
        writeln!(
            out,
            "  confidence: {:.2} ({})",
            verdict.confidence, verdict.confidence_level
        )?;
        if let (Some(ratio), Some(k)) = (verdict.growth_ratio, verdict.batch_factor) {
            writeln!(out, "  growth:     {:.1}x latency for {:.0}x keys", ratio, k)?;
        }
        if let Some(step) = verdict.steepest_growth() {
            writeln!(
                out,
                "  steepest:   {} -> {} keys, {:.1}x (threshold {:.1}x)",
                step.from_batch, step.to_batch, step.ratio, step.threshold
            )?;
        }
        if let Some(exponent) = verdict.growth_exponent {
            writeln!(out, "  exponent:   {:.2}", exponent)?;
        }
        if verdict.circuit_breaker_tripped() {
            writeln!(out, "  note:       circuit breaker tripped, target stopped responding")?;
        }
        writeln!(out, "  outcome:    {}", verdict.outcome.name())?;

        for step in &verdict.steps {
            let median = step
                .median_ms
                .map(|m| format!("{:>12.3} ms", m))
                .unwrap_or_else(|| format!("{:>15}", "no response"));
            writeln!(
                out,
                "    {:>8} keys  {}  ({}/{} ok)",
                step.batch_size, median, step.successes, step.samples
            )?;
        }
        writeln!(out)?;
    }

    for failure in &report.failures {
        writeln!(out, "{} [{}]", failure.target, failure.algorithm)?;
        writeln!(out, "  error: {}", failure.error)?;
        writeln!(out)?;
    }

    writeln!(
        out,
        "{} probed, {} flagged, {} not flagged, {} inconclusive, {} failed",
        report.summary.probes,
        report.summary.flagged,
        report.summary.not_flagged,
        report.summary.inconclusive,
        report.summary.failed_jobs
    )?;

    Ok(out)
}
