//! Application configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::AnalysisConfig;
use crate::collision::{Direction, GeneratorRegistry, HashModel, ALPHANUMERIC, DEFAULT_MAX_BLOCK_LEN};
use crate::error::{ConfigError, HashProbeError};
use crate::http::TransportConfig;
use crate::probe::{BatchLadder, DispatcherConfig, EncodingRules, KeyEncoding, DEFAULT_SEED};
use crate::reporting::ReportFormat;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Probe dispatch settings
    pub probe: ProbeConfig,

    /// Collision generator settings
    pub generator: GeneratorConfig,

    /// Verdict thresholds
    pub analysis: AnalysisConfig,

    /// Report output
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for rotated log files (stderr only when unset)
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON
    pub log_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Strictly increasing batch sizes
    pub batch_sizes: Vec<usize>,

    /// Geometric ladder, used instead of `batch_sizes` when set
    pub geometric: Option<GeometricLadder>,

    /// Seed the colliding keys are derived from
    pub seed: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Consecutive failures that halt a ladder
    pub max_consecutive_failures: usize,

    /// Requests per ladder step
    pub samples_per_step: usize,

    /// Pause between ladder steps in milliseconds
    pub step_delay_ms: u64,

    /// Targets probed at once
    pub concurrency: usize,

    /// User agent string
    pub user_agent: String,

    /// Value of every generated form field
    pub field_value: String,

    /// Key escaping on the wire
    pub key_encoding: KeyEncoding,

    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

/// `start, start*factor, ...` for `steps` steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometricLadder {
    pub start: usize,
    pub factor: usize,
    pub steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Widest multi-character block the search substitutes
    pub max_block_len: usize,

    /// Additional hash models registered next to the built-ins
    pub models: Vec<ModelConfig>,
}

/// User-defined hash model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub bit_width: u32,
    pub multiplier: u64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

fn default_alphabet() -> String {
    ALPHANUMERIC.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report format (from the report file extension when unset)
    pub format: Option<ReportFormat>,

    /// Report file (stdout when unset)
    pub path: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            batch_sizes: BatchLadder::default().sizes().to_vec(),
            geometric: None,
            seed: DEFAULT_SEED.to_string(),
            timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            max_consecutive_failures: 3,
            samples_per_step: 1,
            step_delay_ms: 0,
            concurrency: 4,
            user_agent: format!("hashprobe/{}", env!("CARGO_PKG_VERSION")),
            field_value: String::new(),
            key_encoding: KeyEncoding::Form,
            headers: BTreeMap::new(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            models: Vec::new(),
        }
    }
}

impl ProbeConfig {
    /// The configured ladder, geometric first
    pub fn ladder(&self) -> Result<BatchLadder, ConfigError> {
        match self.geometric {
            Some(g) => BatchLadder::geometric(g.start, g.factor, g.steps),
            None => BatchLadder::explicit(self.batch_sizes.clone()),
        }
    }
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults when no
    /// path is given and the default file is missing
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let config = Self::from_file(&config_path)?;
            Ok((config, ConfigSource::File(config_path)))
        } else if path.is_some() {
            Err(ConfigError::ReadError {
                path: config_path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            }
            .into())
        } else {
            Ok((Self::default(), ConfigSource::Defaults))
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Save configuration to a new file; an existing file is left alone
    pub fn save(&self, path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Refusing to overwrite existing file {}", path.display());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Check every value that would otherwise fail at run time
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probe.ladder()?;

        if self.probe.seed.is_empty() {
            return Err(invalid("probe.seed", "must not be empty"));
        }
        if self.probe.timeout_ms == 0 {
            return Err(invalid("probe.timeout_ms", "must be greater than 0"));
        }
        if self.probe.connect_timeout_ms == 0 {
            return Err(invalid("probe.connect_timeout_ms", "must be greater than 0"));
        }
        if self.probe.concurrency == 0 {
            return Err(invalid("probe.concurrency", "must be at least 1"));
        }
        if self.probe.max_consecutive_failures == 0 {
            return Err(invalid("probe.max_consecutive_failures", "must be at least 1"));
        }
        if self.probe.samples_per_step == 0 {
            return Err(invalid("probe.samples_per_step", "must be at least 1"));
        }
        if self.generator.max_block_len == 0 {
            return Err(invalid("generator.max_block_len", "must be at least 1"));
        }
        if !(self.analysis.quadratic_fraction > 0.0) {
            return Err(invalid("analysis.quadratic_fraction", "must be positive"));
        }
        if !(self.analysis.min_latency_ms >= 0.0) {
            return Err(invalid("analysis.min_latency_ms", "must not be negative"));
        }

        for model in &self.generator.models {
            model
                .to_model()
                .map_err(|e| invalid(&format!("generator.models.{}", model.id), &e.to_string()))?;
        }

        Ok(())
    }

    /// Built-in models plus any configured ones
    pub fn registry(&self) -> Result<GeneratorRegistry, HashProbeError> {
        let mut builder = GeneratorRegistry::builder()
            .max_block_len(self.generator.max_block_len)
            .with_builtins()?;

        for model in &self.generator.models {
            builder = builder.register(model.to_model()?)?;
        }

        Ok(builder.build())
    }

    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, ConfigError> {
        Ok(DispatcherConfig {
            ladder: self.probe.ladder()?,
            seed: self.probe.seed.clone(),
            timeout: Duration::from_millis(self.probe.timeout_ms),
            max_consecutive_failures: self.probe.max_consecutive_failures,
            samples_per_step: self.probe.samples_per_step,
            step_delay: Duration::from_millis(self.probe.step_delay_ms),
            headers: self
                .probe
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            encoding: EncodingRules {
                key_encoding: self.probe.key_encoding,
                field_value: self.probe.field_value.clone(),
            },
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            user_agent: self.probe.user_agent.clone(),
            connect_timeout: Duration::from_millis(self.probe.connect_timeout_ms),
            ..TransportConfig::default()
        }
    }

    /// Get default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "hashprobe", "hashprobe")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "hashprobe", "hashprobe")
            .context("Failed to determine data directory")?;

        Ok(dirs.data_dir().to_path_buf())
    }
}

impl ModelConfig {
    pub fn to_model(&self) -> Result<HashModel, crate::error::GenerationError> {
        HashModel::new(
            self.id.clone(),
            self.bit_width,
            self.multiplier,
            self.direction,
            &self.alphabet,
        )
    }
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String), ConfigError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| invalid("header", &format!("expected 'Name: value', got '{}'", raw)))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(invalid("header", &format!("missing name in '{}'", raw)));
    }

    Ok((name.to_string(), value.trim().to_string()))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
