//! Error types for hashprobe
//!
//! Generation and registry errors are fatal to the run that raised them.
//! Transport failures are absorbed into the sample set by the dispatcher and
//! only surface here when a caller talks to a transport directly.

use thiserror::Error;

/// Main error type for hashprobe operations
#[derive(Error, Debug)]
pub enum HashProbeError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Collision construction errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Algorithm lookup errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Network transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportFailure),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Unsupported protocol: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),
}

/// Collision construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Number of keys must be at least 1 (got {0})")]
    InvalidCount(usize),

    #[error("Seed must not be empty")]
    EmptySeed,

    #[error("Invalid hash model '{id}': {reason}")]
    InvalidModel { id: String, reason: String },

    #[error("Search space exhausted: requested {requested} keys, only {capacity} reachable")]
    Exhausted { requested: usize, capacity: u128 },

    #[error("Generated key '{key}' hashes to {actual:#x}, expected {expected:#x}")]
    HashMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Generated key '{0}' is not unique")]
    DuplicateKey(String),

    #[error("Collision generation task failed: {0}")]
    TaskFailed(String),
}

/// Registry lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Algorithm registered twice: {0}")]
    DuplicateAlgorithm(String),
}

/// Transport-level failures, recorded as failed samples by the dispatcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    #[error("Connection reset: {0}")]
    ConnectionReset(String),

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportFailure {
    /// Short machine-readable kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            TransportFailure::Timeout(_) => "timeout",
            TransportFailure::ConnectionRefused(_) => "connection_refused",
            TransportFailure::ConnectionReset(_) => "connection_reset",
            TransportFailure::Connect(_) => "connect",
            TransportFailure::Request(_) => "request",
            TransportFailure::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl HashProbeError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HashProbeError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            HashProbeError::Generation(e) => format!("Collision generation: {}", e.user_hint()),
            HashProbeError::Registry(e) => format!("Algorithm selection: {}", e.user_hint()),
            HashProbeError::Transport(e) => format!("Network issue: {}", e.user_hint()),
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            ConfigError::UnsupportedScheme(scheme) => {
                format!("'{}' is not supported. Use http or https.", scheme)
            }
            ConfigError::InvalidTarget(url) => {
                format!("'{}' is not a valid target. Use a full URL such as http://host/path.", url)
            }
        }
    }
}

impl UserHint for GenerationError {
    fn user_hint(&self) -> String {
        match self {
            GenerationError::Exhausted { requested, capacity } => {
                format!(
                    "The seed only reaches {} colliding keys but {} were requested. Use a longer seed.",
                    capacity, requested
                )
            }
            GenerationError::EmptySeed => "Provide a non-empty seed string.".into(),
            _ => self.to_string(),
        }
    }
}

impl UserHint for RegistryError {
    fn user_hint(&self) -> String {
        match self {
            RegistryError::UnknownAlgorithm(id) => {
                format!("Algorithm '{}' is not known. Run with --list-algorithms to see the choices.", id)
            }
            RegistryError::DuplicateAlgorithm(id) => {
                format!("Algorithm '{}' is defined more than once. Rename the custom model.", id)
            }
        }
    }
}

impl UserHint for TransportFailure {
    fn user_hint(&self) -> String {
        match self {
            TransportFailure::ConnectionRefused(_) | TransportFailure::Connect(_) => {
                "Could not connect to the server. Check if it's running and accessible.".into()
            }
            TransportFailure::Timeout(ms) => {
                format!("Request timed out after {}ms. The server may be slow or unresponsive.", ms)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_kind() {
        assert_eq!(TransportFailure::Timeout(10).kind(), "timeout");
        assert_eq!(TransportFailure::ConnectionReset("peer".into()).kind(), "connection_reset");
    }

    #[test]
    fn test_user_message_for_unknown_algorithm() {
        let err = HashProbeError::from(RegistryError::UnknownAlgorithm("perl".into()));
        let message = err.user_message();
        assert!(message.contains("perl"));
        assert!(message.contains("--list-algorithms"));
    }

    #[test]
    fn test_exhausted_hint_mentions_counts() {
        let hint = GenerationError::Exhausted { requested: 50, capacity: 11 }.user_hint();
        assert!(hint.contains("11"));
        assert!(hint.contains("50"));
    }
}
