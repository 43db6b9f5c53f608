//! Application core module
//!
//! Wires configuration into the generator registry, the transport and the
//! campaign, and turns finished campaigns into reports.

mod config;

pub use config::{parse_header, Config, ConfigSource};

use anyhow::Result;
use chrono::Utc;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::analysis::VulnerabilityAnalyzer;
use crate::collision::{CollisionSet, GeneratorRegistry};
use crate::error::{ConfigError, HashProbeError};
use crate::http::Transport;
use crate::probe::{Campaign, CampaignJob, CampaignState, ProbeDispatcher, ProbeTarget};
use crate::reporting::{ProbeReport, ReportMetadata};

/// Validated configuration plus the registry built from it
pub struct App {
    config: Config,
    registry: Arc<GeneratorRegistry>,
}

impl App {
    pub fn new(config: Config) -> Result<Self, HashProbeError> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);

        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Table of registered algorithms
    pub fn list_algorithms(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<10} {:>5} {:>12} {:<9} {:>10}",
            "ID", "BITS", "MULTIPLIER", "DIRECTION", "CAPACITY"
        );

        for id in self.registry.ids() {
            let Ok(generator) = self.registry.get(id) else {
                continue;
            };
            let model = generator.model();
            let capacity = generator
                .capacity(&self.config.probe.seed)
                .map(|c| c.to_string())
                .unwrap_or_else(|_| "-".to_string());

            let _ = writeln!(
                out,
                "{:<10} {:>5} {:>12} {:<9} {:>10}",
                model.id(),
                model.bit_width(),
                model.multiplier(),
                model.direction().as_str(),
                capacity
            );
        }

        out
    }

    /// Generate `n` colliding keys for `algorithm` without touching the network
    pub fn generate_keys(&self, algorithm: &str, n: usize) -> Result<CollisionSet, HashProbeError> {
        let generator = self.registry.get(algorithm)?;
        let set = generator.collision_set(&self.config.probe.seed, n)?;

        tracing::info!(
            algorithm = generator.model().id(),
            keys = set.size(),
            target_hash = set.target_hash,
            "Generated collision set"
        );
        Ok(set)
    }

    /// Every (target, algorithm) pair; unknown algorithms and bad URLs fail here
    pub fn jobs(&self, targets: &[String], algorithms: &[String]) -> Result<Vec<CampaignJob>, HashProbeError> {
        if targets.is_empty() {
            return Err(ConfigError::ValidationError {
                field: "target".to_string(),
                reason: "at least one target URL is required".to_string(),
            }
            .into());
        }

        let algorithms: Vec<String> = algorithms
            .iter()
            .map(|a| self.registry.get(a).map(|g| g.model().id().to_string()))
            .collect::<Result<_, _>>()?;

        let mut jobs = Vec::with_capacity(targets.len() * algorithms.len());
        for target in targets {
            let target = ProbeTarget::parse(target)?;
            for algorithm in &algorithms {
                jobs.push(CampaignJob::new(target.clone(), algorithm.clone()));
            }
        }

        Ok(jobs)
    }

    /// Run the campaign and analyze every run
    ///
    /// A shutdown signal stops jobs that have not started; running ladders
    /// finish their current step sequence.
    pub async fn run_campaign(
        &self,
        jobs: Vec<CampaignJob>,
        transport: Arc<dyn Transport>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ProbeReport> {
        let dispatcher = ProbeDispatcher::new(
            self.config.dispatcher_config()?,
            self.registry.clone(),
            transport,
        );
        let campaign = Arc::new(Campaign::new(Arc::new(dispatcher), self.config.probe.concurrency));

        let stopper = campaign.clone();
        let watcher = tokio::spawn(async move {
            if shutdown.recv().await.is_ok() {
                tracing::warn!("Shutdown requested, skipping pending jobs");
                stopper.stop();
            }
        });

        let start_time = Utc::now();
        let reports = campaign.run(jobs).await?;
        watcher.abort();

        let stats = campaign.stats();
        tracing::info!(
            jobs = stats.jobs_total,
            finished = stats.jobs_finished,
            rejected = stats.jobs_rejected,
            breaker_trips = stats.breaker_trips,
            requests = stats.requests_sent,
            elapsed_ms = stats.elapsed_ms,
            "Campaign finished"
        );
        if campaign.state() == CampaignState::Stopped {
            tracing::warn!(
                skipped = stats.jobs_total.saturating_sub(stats.jobs_finished),
                "Campaign stopped early, report is partial"
            );
        }

        let analyzer = VulnerabilityAnalyzer::new(self.config.analysis.clone());
        let metadata = ReportMetadata {
            seed: self.config.probe.seed.clone(),
            batch_sizes: self.config.probe.ladder()?.sizes().to_vec(),
            start_time,
            end_time: Utc::now(),
            ..ReportMetadata::default()
        };

        Ok(ProbeReport::from_jobs(&reports, |run| analyzer.analyze(run), metadata))
    }

    /// Save the report to the configured file, or render it for stdout
    ///
    /// A configured format wins over the file extension.
    pub fn write_report(&self, report: &ProbeReport) -> Result<Option<String>> {
        let output = &self.config.output;
        match &output.path {
            Some(path) => {
                report.save(path, output.format)?;
                Ok(None)
            }
            None => Ok(Some(report.render(output.format.unwrap_or_default())?)),
        }
    }
}

/// File a key set is saved to; one file per algorithm when several are given
pub fn keys_path(base: &Path, algorithm: &str, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("keys");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}.{}", stem, algorithm, ext),
        None => format!("{}-{}", stem, algorithm),
    };
    base.with_file_name(name)
}
