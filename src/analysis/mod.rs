//! Latency growth analysis
//!
//! A hash table degraded by colliding keys costs O(n) per insert, so parsing
//! n fields costs O(n^2). Healthy tables grow roughly linearly. The analyzer
//! compares the latency ratio between every pair of consecutive informative
//! ladder steps against the quadratic expectation for their batch-size
//! factor, so a target that degrades and then hits a field cap still shows.

mod stats;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::probe::{ProbeResult, ProbeRun, RunOutcome};

pub use stats::{log_log_slope, median};

/// Analyzer thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Flag when `ratio > quadratic_fraction * k^2`
    pub quadratic_fraction: f64,
    /// Latencies below this are treated as this value
    pub min_latency_ms: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            quadratic_fraction: 0.5,
            min_latency_ms: 1.0,
        }
    }
}

/// Confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.4 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-step latency summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub step: usize,
    pub batch_size: usize,
    pub samples: usize,
    pub successes: usize,
    /// Median over successful samples
    pub median_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl StepSummary {
    pub fn is_informative(&self) -> bool {
        self.median_ms.is_some()
    }

    /// Weight of this step's sample count, approaching 1 as successes grow
    fn sampling_weight(&self) -> f64 {
        1.0 - 0.5f64.powi(self.successes.min(64) as i32)
    }
}

/// Latency growth between two consecutive informative steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepGrowth {
    pub from_batch: usize,
    pub to_batch: usize,
    /// Median latency ratio, both medians floored
    pub ratio: f64,
    /// `to_batch / from_batch`
    pub batch_factor: f64,
    /// `quadratic_fraction * batch_factor^2`
    pub threshold: f64,
}

impl StepGrowth {
    pub fn is_quadratic(&self) -> bool {
        self.ratio > self.threshold
    }

    /// How far past (or short of) the threshold this step grew
    pub fn severity(&self) -> f64 {
        self.ratio / self.threshold
    }
}

/// Classification of one probe run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub target: String,
    pub algorithm: String,
    pub samples: Vec<ProbeResult>,
    pub steps: Vec<StepSummary>,
    /// Growth between each pair of consecutive informative steps
    pub growth: Vec<StepGrowth>,
    /// Median latency of the first informative step
    pub baseline_latency_ms: Option<f64>,
    /// Last informative median over the baseline
    pub growth_ratio: Option<f64>,
    /// Batch-size factor between those two steps
    pub batch_factor: Option<f64>,
    /// Fitted exponent of latency over batch size
    pub growth_exponent: Option<f64>,
    pub flagged: bool,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub outcome: RunOutcome,
}

impl Verdict {
    /// The step pair that came closest to (or furthest past) its threshold
    pub fn steepest_growth(&self) -> Option<&StepGrowth> {
        self.growth
            .iter()
            .max_by(|a, b| a.severity().total_cmp(&b.severity()))
    }

    pub fn circuit_breaker_tripped(&self) -> bool {
        matches!(self.outcome, RunOutcome::MaxSeverityReached { .. })
    }

    /// Single-word classification
    pub fn label(&self) -> &'static str {
        if self.flagged {
            "VULNERABLE"
        } else if self.growth_ratio.is_none() {
            "INCONCLUSIVE"
        } else {
            "NOT VULNERABLE"
        }
    }
}

/// Turns probe runs into verdicts
#[derive(Debug, Clone, Default)]
pub struct VulnerabilityAnalyzer {
    config: AnalysisConfig,
}

impl VulnerabilityAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, run: &ProbeRun) -> Verdict {
        let steps = summarize_steps(run);
        let informative: Vec<&StepSummary> = steps.iter().filter(|s| s.is_informative()).collect();
        let floor = self.config.min_latency_ms.max(f64::MIN_POSITIVE);
        let floored = |s: &StepSummary| s.median_ms.unwrap_or(0.0).max(floor);

        let baseline = informative.first().and_then(|s| s.median_ms);

        let growth: Vec<StepGrowth> = informative
            .windows(2)
            .map(|pair| {
                let k = pair[1].batch_size as f64 / pair[0].batch_size as f64;
                StepGrowth {
                    from_batch: pair[0].batch_size,
                    to_batch: pair[1].batch_size,
                    ratio: floored(pair[1]) / floored(pair[0]),
                    batch_factor: k,
                    threshold: self.config.quadratic_fraction * k * k,
                }
            })
            .collect();

        let (growth_ratio, batch_factor) = match (informative.first(), informative.last()) {
            (Some(first), Some(last)) if informative.len() >= 2 => (
                Some(floored(last) / floored(first)),
                Some(last.batch_size as f64 / first.batch_size as f64),
            ),
            _ => (None, None),
        };

        let growth_exponent = log_log_slope(
            &informative
                .iter()
                .map(|s| (s.batch_size as f64, floored(s)))
                .collect::<Vec<_>>(),
        );

        let quadratic = growth.iter().any(StepGrowth::is_quadratic);
        let tripped = run.circuit_breaker_tripped();
        let flagged = quadratic || tripped;

        let mut confidence = match batch_factor {
            Some(k) if informative.len() >= 2 => {
                let total = run.results.len().max(1) as f64;
                let successes = run.results.iter().filter(|r| r.is_success()).count() as f64;
                let span = (k.log10() / 2.0).clamp(0.0, 1.0);
                let ladder = 1.0 - 0.5f64.powi(informative.len() as i32 - 1);
                let sampling = informative.iter().map(|s| s.sampling_weight()).sum::<f64>()
                    / informative.len() as f64;
                (successes / total) * (0.5 * span + 0.25 * ladder + 0.25 * sampling)
            }
            _ => 0.0,
        };
        if tripped {
            confidence = confidence.max(0.9);
        }
        let confidence = confidence.clamp(0.0, 1.0);

        tracing::info!(
            url = %run.target,
            algorithm = %run.algorithm,
            flagged,
            ratio = growth_ratio.unwrap_or(0.0),
            confidence,
            "Analysis complete"
        );

        Verdict {
            target: run.target.clone(),
            algorithm: run.algorithm.clone(),
            samples: run.results.clone(),
            steps,
            growth,
            baseline_latency_ms: baseline,
            growth_ratio,
            batch_factor,
            growth_exponent,
            flagged,
            confidence,
            confidence_level: ConfidenceLevel::from_score(confidence),
            outcome: run.outcome.clone(),
        }
    }
}

fn summarize_steps(run: &ProbeRun) -> Vec<StepSummary> {
    run.by_batch_size()
        .into_iter()
        .map(|(batch_size, results)| {
            let latencies: Vec<f64> = results
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.elapsed_ms())
                .collect();

            StepSummary {
                step: results.first().map(|r| r.step).unwrap_or(0),
                batch_size,
                samples: results.len(),
                successes: latencies.len(),
                median_ms: median(&latencies),
                min_ms: latencies.iter().copied().reduce(f64::min),
                max_ms: latencies.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}
