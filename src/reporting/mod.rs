//! Report Generation Module
//!
//! Renders campaign verdicts in several formats:
//! - Text (terminal summary)
//! - JSON (machine-readable, includes every sample)
//! - CSV (one row per ladder step)
//! - Markdown (documentation-friendly)

pub mod formats;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::Verdict;
use crate::probe::{JobOutcome, JobReport};

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Seed the collision sets were derived from
    pub seed: String,
    /// Batch sizes probed
    pub batch_sizes: Vec<usize>,
    /// Campaign start time
    pub start_time: DateTime<Utc>,
    /// Campaign end time
    pub end_time: DateTime<Utc>,
    /// Tool version
    pub tool_version: String,
    /// Report generation time
    pub generated_at: DateTime<Utc>,
    /// Custom notes
    pub notes: Option<String>,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            title: "Hash Flooding Assessment".to_string(),
            seed: String::new(),
            batch_sizes: Vec::new(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            notes: None,
        }
    }
}

/// A job that produced no verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub target: String,
    pub algorithm: String,
    pub error: String,
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Verdicts produced
    pub probes: usize,
    pub flagged: usize,
    pub not_flagged: usize,
    /// Verdicts without a growth ratio
    pub inconclusive: usize,
    /// Jobs rejected or skipped
    pub failed_jobs: usize,
    pub breaker_trips: usize,
    pub total_requests: usize,
    pub failed_requests: usize,
    /// Campaign duration in seconds
    pub duration_secs: u64,
}

impl ReportSummary {
    /// Calculate summary from verdicts
    pub fn from_verdicts(verdicts: &[Verdict], failures: &[JobFailure], metadata: &ReportMetadata) -> Self {
        let mut summary = Self {
            probes: verdicts.len(),
            failed_jobs: failures.len(),
            ..Self::default()
        };

        for verdict in verdicts {
            if verdict.flagged {
                summary.flagged += 1;
            } else if verdict.growth_ratio.is_none() {
                summary.inconclusive += 1;
            } else {
                summary.not_flagged += 1;
            }

            if verdict.circuit_breaker_tripped() {
                summary.breaker_trips += 1;
            }

            summary.total_requests += verdict.samples.len();
            summary.failed_requests += verdict.samples.iter().filter(|s| !s.is_success()).count();
        }

        let duration = metadata.end_time.signed_duration_since(metadata.start_time);
        summary.duration_secs = duration.num_seconds().max(0) as u64;

        summary
    }
}

/// Complete campaign report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: ReportSummary,
    /// One verdict per probed (target, algorithm)
    pub verdicts: Vec<Verdict>,
    /// Jobs that never produced a verdict
    pub failures: Vec<JobFailure>,
}

impl ProbeReport {
    /// Create a new report
    pub fn new(verdicts: Vec<Verdict>, failures: Vec<JobFailure>, metadata: ReportMetadata) -> Self {
        let summary = ReportSummary::from_verdicts(&verdicts, &failures, &metadata);

        Self {
            metadata,
            summary,
            verdicts,
            failures,
        }
    }

    /// Build a report from campaign job reports, analyzing each run
    pub fn from_jobs(
        jobs: &[JobReport],
        analyze: impl Fn(&crate::probe::ProbeRun) -> Verdict,
        metadata: ReportMetadata,
    ) -> Self {
        let mut verdicts = Vec::new();
        let mut failures = Vec::new();

        for job in jobs {
            match &job.outcome {
                JobOutcome::Probed { run } => verdicts.push(analyze(run)),
                JobOutcome::Rejected { error } => failures.push(JobFailure {
                    target: job.target.clone(),
                    algorithm: job.algorithm.clone(),
                    error: error.clone(),
                }),
                JobOutcome::Skipped => failures.push(JobFailure {
                    target: job.target.clone(),
                    algorithm: job.algorithm.clone(),
                    error: "skipped: campaign stopped".to_string(),
                }),
            }
        }

        Self::new(verdicts, failures, metadata)
    }

    /// Any target flagged
    pub fn any_flagged(&self) -> bool {
        self.summary.flagged > 0
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => formats::text::generate(self),
            ReportFormat::Json => formats::json::generate(self),
            ReportFormat::Csv => formats::csv::generate(self),
            ReportFormat::Markdown => formats::markdown::generate(self),
        }
    }

    /// Save report to file; format from the extension unless given
    pub fn save(&self, path: &Path, format: Option<ReportFormat>) -> Result<()> {
        let format = format
            .or_else(|| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .and_then(ReportFormat::from_extension)
            })
            .unwrap_or(ReportFormat::Text);

        let content = self.render(format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        tracing::info!(path = %path.display(), format = format.name(), "Report saved");
        Ok(())
    }
}

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "markdown",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "md" | "markdown" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::VulnerabilityAnalyzer;
    use crate::http::Protocol;
    use crate::probe::{ProbeOutcome, ProbeRequest, ProbeResult, ProbeRun, RunOutcome};
    use std::time::Duration;

    fn run(target: &str, latencies: &[(usize, f64)], outcome: RunOutcome) -> ProbeRun {
        let mut run = ProbeRun::new(target, "v8");
        for (step, (size, ms)) in latencies.iter().enumerate() {
            run.record(ProbeResult {
                step,
                sample: 0,
                request: ProbeRequest {
                    target_uri: target.to_string(),
                    protocol: Protocol::Http,
                    port: 80,
                    encoded_body: Vec::new(),
                    body_bytes: size * 8,
                    collision_set_size: *size,
                },
                elapsed: Duration::from_secs_f64(ms / 1000.0),
                outcome: ProbeOutcome::Status { code: 200 },
                issued_at: Utc::now(),
            });
        }
        run.finish(outcome);
        run
    }

    /// One flagged target, one healthy target and one rejected job
    pub(crate) fn sample_report() -> ProbeReport {
        let analyzer = VulnerabilityAnalyzer::default();
        let jobs = vec![
            JobReport {
                index: 0,
                target: "http://vulnerable.test/".to_string(),
                algorithm: "v8".to_string(),
                outcome: JobOutcome::Probed {
                    run: run(
                        "http://vulnerable.test/",
                        &[(100, 2.0), (1000, 200.0), (10_000, 20_000.0)],
                        RunOutcome::Completed,
                    ),
                },
            },
            JobReport {
                index: 1,
                target: "http://healthy.test/".to_string(),
                algorithm: "v8".to_string(),
                outcome: JobOutcome::Probed {
                    run: run(
                        "http://healthy.test/",
                        &[(100, 2.0), (1000, 20.0), (10_000, 200.0)],
                        RunOutcome::Completed,
                    ),
                },
            },
            JobReport {
                index: 2,
                target: "http://other.test/".to_string(),
                algorithm: "perl".to_string(),
                outcome: JobOutcome::Rejected {
                    error: "Unknown algorithm: perl".to_string(),
                },
            },
        ];

        let metadata = ReportMetadata {
            seed: "hashprobe".to_string(),
            batch_sizes: vec![100, 1000, 10_000],
            ..ReportMetadata::default()
        };
        ProbeReport::from_jobs(&jobs, |r| analyzer.analyze(r), metadata)
    }

    #[test]
    fn test_report_summary() {
        let report = sample_report();

        assert_eq!(report.summary.probes, 2);
        assert_eq!(report.summary.flagged, 1);
        assert_eq!(report.summary.not_flagged, 1);
        assert_eq!(report.summary.failed_jobs, 1);
        assert_eq!(report.summary.total_requests, 6);
        assert!(report.any_flagged());
        assert_eq!(report.failures[0].algorithm, "perl");
    }

    #[test]
    fn test_report_format_from_extension() {
        assert_eq!(ReportFormat::from_extension("txt"), Some(ReportFormat::Text));
        assert_eq!(ReportFormat::from_extension("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::from_extension("MD"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::from_extension("html"), None);
    }

    #[test]
    fn test_save_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        sample_report().save(&path, None).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["summary"]["flagged"], 1);
    }
}
