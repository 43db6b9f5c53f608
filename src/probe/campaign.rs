//! Multi-target campaigns
//!
//! Each job is one ladder against one target. Jobs run concurrently up to the
//! configured limit; reports come back in job order regardless of which
//! finished first.

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::dispatcher::ProbeDispatcher;
use super::request::ProbeTarget;
use super::results::ProbeRun;

/// Campaign state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignState {
    Idle,
    Running,
    Stopped,
    Completed,
}

/// One (target, algorithm) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignJob {
    pub target: ProbeTarget,
    pub algorithm: String,
}

impl CampaignJob {
    pub fn new(target: ProbeTarget, algorithm: impl Into<String>) -> Self {
        Self {
            target,
            algorithm: algorithm.into(),
        }
    }
}

/// How a job ended
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The ladder ran; the run carries its own outcome
    Probed { run: ProbeRun },
    /// The job never sent a request
    Rejected { error: String },
    /// The campaign was stopped before the job started
    Skipped,
}

/// Result of one job, in submission order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub index: usize,
    pub target: String,
    pub algorithm: String,
    pub outcome: JobOutcome,
}

/// Campaign statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignStats {
    pub jobs_total: usize,
    pub jobs_finished: usize,
    pub jobs_rejected: usize,
    pub breaker_trips: usize,
    pub requests_sent: usize,
    pub elapsed_ms: u64,
}

/// Runs many ladders with bounded concurrency
pub struct Campaign {
    dispatcher: Arc<ProbeDispatcher>,
    max_concurrent: usize,
    state: Arc<RwLock<CampaignState>>,
    stats: Arc<RwLock<CampaignStats>>,
}

impl Campaign {
    pub fn new(dispatcher: Arc<ProbeDispatcher>, max_concurrent: usize) -> Self {
        Self {
            dispatcher,
            max_concurrent: max_concurrent.max(1),
            state: Arc::new(RwLock::new(CampaignState::Idle)),
            stats: Arc::new(RwLock::new(CampaignStats::default())),
        }
    }

    /// Run all jobs and return one report per job
    pub async fn run(&self, jobs: Vec<CampaignJob>) -> Result<Vec<JobReport>> {
        *self.state.write() = CampaignState::Running;
        {
            let mut stats = self.stats.write();
            *stats = CampaignStats::default();
            stats.jobs_total = jobs.len();
        }

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(jobs.len());

        tracing::info!(jobs = jobs.len(), concurrency = self.max_concurrent, "Starting campaign");

        for (index, job) in jobs.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;

            let dispatcher = self.dispatcher.clone();
            let state = self.state.clone();
            let stats = self.stats.clone();

            let handle = tokio::spawn(async move {
                let target = job.target.uri.clone();
                let algorithm = job.algorithm.clone();

                if *state.read() == CampaignState::Stopped {
                    drop(permit);
                    return JobReport {
                        index,
                        target,
                        algorithm,
                        outcome: JobOutcome::Skipped,
                    };
                }

                let outcome = match dispatcher.run(&job.target, &job.algorithm).await {
                    Ok(run) => JobOutcome::Probed { run },
                    Err(e) => {
                        tracing::error!(url = %target, algorithm = %algorithm, error = %e, "Job rejected");
                        JobOutcome::Rejected { error: e.to_string() }
                    }
                };

                let progress = {
                    let mut stats = stats.write();
                    stats.jobs_finished += 1;
                    match &outcome {
                        JobOutcome::Probed { run } => {
                            stats.requests_sent += run.results.len();
                            if run.circuit_breaker_tripped() {
                                stats.breaker_trips += 1;
                            }
                        }
                        JobOutcome::Rejected { .. } => stats.jobs_rejected += 1,
                        JobOutcome::Skipped => {}
                    }
                    stats.clone()
                };

                tracing::info!(
                    url = %target,
                    algorithm = %algorithm,
                    finished = progress.jobs_finished,
                    total = progress.jobs_total,
                    requests = progress.requests_sent,
                    breaker_trips = progress.breaker_trips,
                    "Job finished"
                );

                drop(permit);
                JobReport {
                    index,
                    target,
                    algorithm,
                    outcome,
                }
            });

            handles.push(handle);
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(index, error = %e, "Campaign job panicked");
                    reports.push(JobReport {
                        index,
                        target: String::new(),
                        algorithm: String::new(),
                        outcome: JobOutcome::Rejected {
                            error: format!("job task failed: {}", e),
                        },
                    });
                }
            }
        }

        self.stats.write().elapsed_ms = started.elapsed().as_millis() as u64;
        {
            let mut state = self.state.write();
            if *state == CampaignState::Running {
                *state = CampaignState::Completed;
            }
        }

        tracing::info!(jobs = reports.len(), "Campaign finished");
        Ok(reports)
    }

    /// Jobs that have not started yet are skipped
    pub fn stop(&self) {
        *self.state.write() = CampaignState::Stopped;
    }

    pub fn state(&self) -> CampaignState {
        *self.state.read()
    }

    pub fn stats(&self) -> CampaignStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportFailure;
    use crate::http::{Transport, TransportRequest, TransportResponse};
    use crate::probe::dispatcher::tests::{dispatcher, ScriptedTransport};
    use crate::probe::{BatchLadder, DispatcherConfig};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            ladder: BatchLadder::explicit(vec![10, 20]).unwrap(),
            ..DispatcherConfig::default()
        }
    }

    fn job(uri: &str, algorithm: &str) -> CampaignJob {
        CampaignJob::new(ProbeTarget::parse(uri).unwrap(), algorithm)
    }

    fn probed(report: &JobReport) -> Option<&ProbeRun> {
        match &report.outcome {
            JobOutcome::Probed { run } => Some(run),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_reports_follow_job_order() {
        let transport = Arc::new(ScriptedTransport::linear());
        let campaign = Campaign::new(Arc::new(dispatcher(transport.clone(), config())), 4);

        let jobs = vec![
            job("http://a.test/", "v8"),
            job("http://b.test/", "nope"),
            job("http://c.test/", "php"),
        ];
        let reports = campaign.run(jobs).await.unwrap();

        let order: Vec<usize> = reports.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(reports[0].target, "http://a.test/");
        assert!(probed(&reports[0]).is_some());
        assert!(matches!(reports[1].outcome, JobOutcome::Rejected { .. }));
        assert_eq!(probed(&reports[2]).unwrap().algorithm, "php");

        let stats = campaign.stats();
        assert_eq!(stats.jobs_total, 3);
        assert_eq!(stats.jobs_finished, 3);
        assert_eq!(stats.jobs_rejected, 1);
        assert_eq!(stats.requests_sent, 4);
        assert_eq!(transport.call_count(), 4);
        assert_eq!(campaign.state(), CampaignState::Completed);
    }

    /// Records the highest number of requests in flight at once
    struct GaugeTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for GaugeTransport {
        async fn send(&self, _request: &TransportRequest) -> Result<TransportResponse, TransportFailure> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 200,
                elapsed: Duration::from_millis(20),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let transport = Arc::new(GaugeTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let campaign = Campaign::new(Arc::new(dispatcher(transport.clone(), config())), 2);

        let jobs = (0..6).map(|i| job(&format!("http://host{}.test/", i), "java")).collect();
        let reports = campaign.run(jobs).await.unwrap();

        assert_eq!(reports.len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
        assert!(transport.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_skips_pending_jobs() {
        let transport = Arc::new(GaugeTransport {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let campaign = Arc::new(Campaign::new(Arc::new(dispatcher(transport, config())), 1));

        let stopper = campaign.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.stop();
        });

        let jobs = (0..3).map(|i| job(&format!("http://host{}.test/", i), "v8")).collect();
        let reports = campaign.run(jobs).await.unwrap();

        assert!(probed(&reports[0]).is_some());
        assert!(matches!(reports[1].outcome, JobOutcome::Skipped));
        assert!(matches!(reports[2].outcome, JobOutcome::Skipped));
        assert_eq!(campaign.state(), CampaignState::Stopped);
    }
}
