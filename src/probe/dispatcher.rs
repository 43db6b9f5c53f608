//! Ladder dispatcher
//!
//! Runs the batch-size ladder against one target. Requests inside a ladder
//! are strictly sequential so each measured latency belongs to exactly one
//! request; independent targets are parallelised by the campaign.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;

use super::ladder::BatchLadder;
use super::request::{EncodingRules, ProbeRequestBuilder, ProbeTarget};
use super::results::{ProbeOutcome, ProbeResult, ProbeRun, RunOutcome};
use crate::collision::{CollisionGenerator, CollisionSet, GeneratorRegistry};
use crate::error::{GenerationError, RegistryError, TransportFailure};
use crate::http::{Transport, TransportResponse};

/// Default seed; long enough for 10,000+ keys under every built-in model
pub const DEFAULT_SEED: &str = "hashprobehashprobehashprobehashprobe";

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub ladder: BatchLadder,
    pub seed: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Consecutive failures that halt the ladder
    pub max_consecutive_failures: usize,
    /// Requests issued per ladder step
    pub samples_per_step: usize,
    /// Pause between ladder steps
    pub step_delay: Duration,
    pub headers: Vec<(String, String)>,
    pub encoding: EncodingRules,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ladder: BatchLadder::default(),
            seed: DEFAULT_SEED.to_string(),
            timeout: Duration::from_secs(30),
            max_consecutive_failures: 3,
            samples_per_step: 1,
            step_delay: Duration::ZERO,
            headers: Vec::new(),
            encoding: EncodingRules::default(),
        }
    }
}

/// Issues one target's ladder and records every attempt
pub struct ProbeDispatcher {
    config: DispatcherConfig,
    registry: Arc<GeneratorRegistry>,
    transport: Arc<dyn Transport>,
    builder: ProbeRequestBuilder,
}

impl ProbeDispatcher {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<GeneratorRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let builder = ProbeRequestBuilder::new(config.encoding.clone());
        Self {
            config,
            registry,
            transport,
            builder,
        }
    }

    /// Run the whole ladder against `target` using `algorithm`'s collisions
    ///
    /// An unknown algorithm fails before any request is sent. Generation
    /// failures and transport failures end up in the returned run.
    pub async fn run(&self, target: &ProbeTarget, algorithm: &str) -> Result<ProbeRun, RegistryError> {
        let generator = self.registry.get(algorithm)?.clone();
        let mut run = ProbeRun::new(&target.uri, generator.model().id());
        let mut consecutive_failures = 0usize;

        tracing::info!(
            url = %target,
            algorithm = generator.model().id(),
            steps = self.config.ladder.steps(),
            "Starting probe ladder"
        );

        for (step, &batch_size) in self.config.ladder.sizes().iter().enumerate() {
            if step > 0 && !self.config.step_delay.is_zero() {
                tokio::time::sleep(self.config.step_delay).await;
            }

            let set = match generate(&generator, &self.config.seed, batch_size).await {
                Ok(set) => set,
                Err(e) => {
                    tracing::error!(url = %target, batch_size, error = %e, "Collision generation failed");
                    finish(&mut run, RunOutcome::Aborted {
                        reason: e.to_string(),
                    });
                    return Ok(run);
                }
            };

            let request = self.builder.build(target, &set);
            drop(set);
            let recorded = request.without_body();

            for sample in 0..self.config.samples_per_step.max(1) {
                let issued_at = Utc::now();
                let transport_request =
                    request.to_transport(target, &self.config.headers, self.config.timeout);

                let outcome = self.send(&transport_request).await;

                let (elapsed, outcome) = match outcome {
                    Ok(response) => {
                        consecutive_failures = 0;
                        tracing::info!(
                            url = %target,
                            batch_size,
                            status = response.status,
                            elapsed_ms = response.elapsed.as_millis() as u64,
                            "Probe completed"
                        );
                        (response.elapsed, ProbeOutcome::Status { code: response.status })
                    }
                    Err((elapsed, failure)) => {
                        consecutive_failures += 1;
                        tracing::warn!(
                            url = %target,
                            batch_size,
                            error = %failure,
                            consecutive_failures,
                            "Probe failed"
                        );
                        (elapsed, ProbeOutcome::from_failure(&failure))
                    }
                };

                run.record(ProbeResult {
                    step,
                    sample,
                    request: recorded.clone(),
                    elapsed,
                    outcome,
                    issued_at,
                });

                if consecutive_failures >= self.config.max_consecutive_failures.max(1) {
                    tracing::warn!(
                        url = %target,
                        consecutive_failures,
                        "Circuit breaker tripped, halting ladder"
                    );
                    finish(&mut run, RunOutcome::MaxSeverityReached {
                        consecutive_failures,
                    });
                    return Ok(run);
                }
            }
        }

        finish(&mut run, RunOutcome::Completed);
        Ok(run)
    }

    /// Send with the configured timeout; failures keep their elapsed time
    async fn send(
        &self,
        request: &crate::http::TransportRequest,
    ) -> Result<TransportResponse, (Duration, TransportFailure)> {
        let start = Instant::now();
        match tokio::time::timeout(self.config.timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err((start.elapsed(), failure)),
            Err(_) => Err((
                start.elapsed(),
                TransportFailure::Timeout(self.config.timeout.as_millis() as u64),
            )),
        }
    }
}

fn finish(run: &mut ProbeRun, outcome: RunOutcome) {
    run.finish(outcome);

    let stats = run.stats();
    tracing::info!(
        url = %run.target,
        algorithm = %run.algorithm,
        outcome = run.outcome.name(),
        requests = stats.total_requests,
        failed = stats.failed_requests,
        timeouts = stats.timeouts,
        slowest_ms = stats.slowest_response.as_millis() as u64,
        statuses = ?stats.status_distribution,
        "Probe ladder finished"
    );
}

/// Collision generation is CPU-bound, keep it off the async workers
async fn generate(
    generator: &CollisionGenerator,
    seed: &str,
    batch_size: usize,
) -> Result<CollisionSet, GenerationError> {
    let generator = generator.clone();
    let seed = seed.to_string();

    tokio::task::spawn_blocking(move || generator.collision_set(&seed, batch_size))
        .await
        .unwrap_or_else(|join_error| Err(task_failed(join_error)))
}

fn task_failed(join_error: JoinError) -> GenerationError {
    tracing::error!(error = %join_error, "Collision generation task failed");
    GenerationError::TaskFailed(join_error.to_string())
}
