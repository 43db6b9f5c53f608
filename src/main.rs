//! hashprobe - Hash Flooding Assessment Tool
//!
//! Generates colliding form-field names for known string hash functions and
//! measures how a target's request latency grows with the number of keys.

mod analysis;
mod app;
mod collision;
mod error;
mod http;
mod probe;
mod reporting;

pub use error::*;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{keys_path, parse_header, App, Config, ConfigSource};
use crate::http::HttpTransport;
use crate::probe::BatchLadder;
use crate::reporting::ReportFormat;

/// Hash Flooding Assessment Tool
#[derive(Parser, Debug)]
#[command(name = "hashprobe")]
#[command(author, version, about = "Hash flooding assessment tool", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HASHPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Target URL (repeatable)
    #[arg(short, long, env = "HASHPROBE_TARGET", value_delimiter = ',')]
    target: Vec<String>,

    /// Hash algorithm identifier (repeatable)
    #[arg(short, long, default_value = "v8", env = "HASHPROBE_ALGORITHM", value_delimiter = ',')]
    algorithm: Vec<String>,

    /// Increasing batch sizes, comma separated
    #[arg(long, env = "HASHPROBE_BATCH_SIZES", value_delimiter = ',', conflicts_with = "keys")]
    batch_sizes: Option<Vec<usize>>,

    /// Single batch size
    #[arg(short, long, env = "HASHPROBE_KEYS")]
    keys: Option<usize>,

    /// Seed string the keys are derived from
    #[arg(long, env = "HASHPROBE_SEED")]
    seed: Option<String>,

    /// Targets probed at once
    #[arg(long, env = "HASHPROBE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "HASHPROBE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Consecutive failures that halt a ladder
    #[arg(long, env = "HASHPROBE_MAX_FAILURES")]
    max_failures: Option<usize>,

    /// Requests per ladder step
    #[arg(long, env = "HASHPROBE_SAMPLES")]
    samples: Option<usize>,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long)]
    header: Vec<String>,

    /// Report format
    #[arg(short, long, value_enum, env = "HASHPROBE_FORMAT")]
    format: Option<ReportFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, env = "HASHPROBE_OUTPUT")]
    output: Option<PathBuf>,

    /// List available algorithms and exit
    #[arg(long)]
    list_algorithms: bool,

    /// Only generate keys, send nothing
    #[arg(long)]
    generate_only: bool,

    /// Save the generated keys (largest batch) to a file
    #[arg(long)]
    save_keys: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "HASHPROBE_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, env = "HASHPROBE_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, env = "HASHPROBE_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit; writes FILE when given
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    generate_config: Option<Option<PathBuf>>,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(probe_error) = e.downcast_ref::<HashProbeError>() {
                eprintln!("Error: {}", probe_error.user_message());
            } else if let Some(config_error) = e.downcast_ref::<ConfigError>() {
                eprintln!("Error: {}", config_error.user_hint());
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Handle special commands first
    if let Some(path) = &cli.generate_config {
        return generate_default_config(path.as_deref());
    }

    // Load configuration before logging so the config can pick the log dir
    let (config, source) = load_config(&cli)?;

    init_logging(&cli, &config)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting hashprobe");
    match &source {
        ConfigSource::File(_) => tracing::info!(config = %source, "Loaded configuration"),
        ConfigSource::Defaults => tracing::info!("No configuration file found, using defaults"),
    }

    let app = App::new(config)?;

    if cli.validate_config {
        println!("Configuration is valid");
        return Ok(());
    }

    if cli.list_algorithms {
        print!("{}", app.list_algorithms());
        return Ok(());
    }

    if cli.generate_only || cli.save_keys.is_some() {
        save_or_print_keys(&app, &cli)?;
        if cli.generate_only {
            return Ok(());
        }
    }

    let jobs = app.jobs(&cli.target, &cli.algorithm)?;

    let transport = HttpTransport::new(&app.config().transport_config())
        .map_err(|e| e.context("HTTP client setup failed"))?;

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        handle_signals(shutdown_tx).await;
    });

    let report = app.run_campaign(jobs, Arc::new(transport), shutdown_rx).await?;

    if let Some(rendered) = app.write_report(&report)? {
        print!("{}", rendered);
    }

    if report.any_flagged() {
        tracing::warn!(
            flagged = report.summary.flagged,
            probes = report.summary.probes,
            "Targets show quadratic latency growth"
        );
    }
    tracing::info!(
        flagged = report.summary.flagged,
        probes = report.summary.probes,
        "hashprobe finished"
    );

    Ok(())
}

/// Initialize the logging system
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let json = cli.log_json || config.general.log_json;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    let file_appender = match (&cli.log_file, &config.general.log_dir) {
        (Some(log_path), _) if log_path.contains('/') || log_path.contains('\\') => {
            let path = std::path::Path::new(log_path);
            let dir = path.parent().unwrap_or(std::path::Path::new("."));
            let filename = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("hashprobe.log");
            Some(RollingFileAppender::new(Rotation::DAILY, dir, filename))
        }
        (Some(log_name), _) => {
            let log_dir = config
                .general
                .log_dir
                .clone()
                .or_else(|| Config::data_dir().ok().map(|d| d.join("logs")))
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&log_dir).ok();
            Some(RollingFileAppender::new(Rotation::DAILY, log_dir, log_name))
        }
        (None, Some(log_dir)) => {
            std::fs::create_dir_all(log_dir).ok();
            Some(RollingFileAppender::new(Rotation::DAILY, log_dir, "hashprobe.log"))
        }
        (None, None) => None,
    };

    // Reports go to stdout, so console logs go to stderr
    match (file_appender, json) {
        (Some(appender), true) => subscriber
            .with(fmt::layer().json().with_writer(appender).with_ansi(false))
            .init(),
        (Some(appender), false) => subscriber
            .with(fmt::layer().with_writer(appender).with_ansi(false))
            .init(),
        (None, true) => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        (None, false) => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<(Config, ConfigSource)> {
    let (mut config, source) = Config::load(cli.config.as_deref())?;

    if let Some(sizes) = &cli.batch_sizes {
        config.probe.batch_sizes = sizes.clone();
        config.probe.geometric = None;
    }
    if let Some(keys) = cli.keys {
        config.probe.batch_sizes = BatchLadder::single(keys)
            .map_err(HashProbeError::from)?
            .sizes()
            .to_vec();
        config.probe.geometric = None;
    }
    if let Some(seed) = &cli.seed {
        config.probe.seed = seed.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.probe.concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.probe.timeout_ms = timeout_ms;
    }
    if let Some(max_failures) = cli.max_failures {
        config.probe.max_consecutive_failures = max_failures;
    }
    if let Some(samples) = cli.samples {
        config.probe.samples_per_step = samples;
    }
    for raw in &cli.header {
        let (name, value) = parse_header(raw).map_err(HashProbeError::from)?;
        config.probe.headers.insert(name, value);
    }
    if let Some(format) = cli.format {
        config.output.format = Some(format);
    }
    if let Some(output) = &cli.output {
        config.output.path = Some(output.clone());
    }

    Ok((config, source))
}

/// Generate collision sets for the largest batch size, then print or save them
fn save_or_print_keys(app: &App, cli: &Cli) -> Result<()> {
    let n = app.config().probe.ladder().map_err(HashProbeError::from)?.largest();
    let several = cli.algorithm.len() > 1;

    for algorithm in &cli.algorithm {
        let set = app.generate_keys(algorithm, n)?;

        match &cli.save_keys {
            Some(base) => set.save(&keys_path(base, algorithm, several))?,
            None => {
                if several {
                    println!("# {}", set.model_id);
                }
                for key in &set.keys {
                    println!("{}", key);
                }
            }
        }
    }

    Ok(())
}

/// Print the default configuration, or write it to a new file
fn generate_default_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = Config::default();

    match path {
        Some(path) => {
            config.save(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => {
            let toml = config.to_toml().context("Failed to render default configuration")?;
            println!("{}", toml);
        }
    }
    Ok(())
}

/// Handle shutdown signals
async fn handle_signals(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                _ => {
                    tracing::warn!("Failed to register signal handlers");
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown");
            }
        }
    }

    #[cfg(windows)]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Failed to register Ctrl+C handler");
            return;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown");
    }

    let _ = shutdown_tx.send(());
}
