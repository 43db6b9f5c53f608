//! Probe result collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use super::request::ProbeRequest;
use crate::error::TransportFailure;

/// What came back for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// The server answered with a status code
    Status { code: u16 },
    /// The request never completed
    Failure { kind: String, reason: String },
}

impl ProbeOutcome {
    pub fn from_failure(failure: &TransportFailure) -> Self {
        ProbeOutcome::Failure {
            kind: failure.kind().to_string(),
            reason: failure.to_string(),
        }
    }
}

/// Single probe attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Ladder step index, starting at 0
    pub step: usize,
    /// Sample index within the step
    pub sample: usize,
    pub request: ProbeRequest,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub outcome: ProbeOutcome,
    pub issued_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn batch_size(&self) -> usize {
        self.request.collision_set_size
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Status { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.outcome {
            ProbeOutcome::Status { code } => Some(code),
            ProbeOutcome::Failure { .. } => None,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// How a dispatch run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every ladder step was issued
    Completed,
    /// Consecutive failures tripped the circuit breaker
    MaxSeverityReached { consecutive_failures: usize },
    /// Collision generation failed part way through the ladder
    Aborted { reason: String },
}

impl RunOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::MaxSeverityReached { .. } => "max severity reached",
            RunOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Append-only record of one target's ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRun {
    pub id: Uuid,
    pub target: String,
    pub algorithm: String,
    pub results: Vec<ProbeResult>,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProbeRun {
    pub fn new(target: &str, algorithm: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.to_string(),
            algorithm: algorithm.to_string(),
            results: Vec::new(),
            outcome: RunOutcome::Completed,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, result: ProbeResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    pub fn circuit_breaker_tripped(&self) -> bool {
        matches!(self.outcome, RunOutcome::MaxSeverityReached { .. })
    }

    /// Results grouped by batch size, ascending
    pub fn by_batch_size(&self) -> BTreeMap<usize, Vec<&ProbeResult>> {
        let mut grouped: BTreeMap<usize, Vec<&ProbeResult>> = BTreeMap::new();
        for result in &self.results {
            grouped.entry(result.batch_size()).or_default().push(result);
        }
        grouped
    }

    /// Get statistics
    pub fn stats(&self) -> RunStats {
        let total = self.results.len();
        let failures = self.results.iter().filter(|r| !r.is_success()).count();
        let timeouts = self
            .results
            .iter()
            .filter(|r| matches!(&r.outcome, ProbeOutcome::Failure { kind, .. } if kind == "timeout"))
            .count();

        let mut status_distribution = BTreeMap::new();
        for code in self.results.iter().filter_map(|r| r.status_code()) {
            *status_distribution.entry(code).or_insert(0) += 1;
        }

        let slowest = self
            .results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.elapsed)
            .max()
            .unwrap_or(Duration::ZERO);

        RunStats {
            total_requests: total,
            successful_requests: total - failures,
            failed_requests: failures,
            timeouts,
            slowest_response: slowest,
            status_distribution,
        }
    }
}

/// Statistics for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub timeouts: usize,
    #[serde(with = "duration_ms")]
    pub slowest_response: Duration,
    pub status_distribution: BTreeMap<u16, usize>,
}

/// Serialize durations as fractional milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Protocol;

    fn result(step: usize, size: usize, ms: u64, outcome: ProbeOutcome) -> ProbeResult {
        ProbeResult {
            step,
            sample: 0,
            request: ProbeRequest {
                target_uri: "http://example.com/".to_string(),
                protocol: Protocol::Http,
                port: 80,
                encoded_body: Vec::new(),
                body_bytes: 0,
                collision_set_size: size,
            },
            elapsed: Duration::from_millis(ms),
            outcome,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_stats() {
        let mut run = ProbeRun::new("http://example.com/", "v8");
        run.record(result(0, 10, 5, ProbeOutcome::Status { code: 200 }));
        run.record(result(1, 100, 50, ProbeOutcome::Status { code: 200 }));
        run.record(result(2, 1000, 0, ProbeOutcome::from_failure(&TransportFailure::Timeout(1000))));
        run.finish(RunOutcome::Completed);

        let stats = run.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.successful_requests, 2);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.slowest_response, Duration::from_millis(50));
        assert_eq!(stats.status_distribution.get(&200), Some(&2));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_by_batch_size_is_ascending() {
        let mut run = ProbeRun::new("http://example.com/", "java");
        run.record(result(0, 100, 1, ProbeOutcome::Status { code: 200 }));
        run.record(result(0, 100, 2, ProbeOutcome::Status { code: 200 }));
        run.record(result(1, 1000, 3, ProbeOutcome::Status { code: 200 }));

        let grouped = run.by_batch_size();
        let sizes: Vec<usize> = grouped.keys().copied().collect();
        assert_eq!(sizes, vec![100, 1000]);
        assert_eq!(grouped[&100].len(), 2);
    }

    #[test]
    fn test_result_serializes_elapsed_in_ms() {
        let r = result(0, 10, 250, ProbeOutcome::Status { code: 413 });
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["elapsed"], 250.0);
        assert_eq!(json["outcome"]["type"], "status");
        assert_eq!(json["outcome"]["code"], 413);
        assert!(json["request"].get("encoded_body").is_none());
    }
}
