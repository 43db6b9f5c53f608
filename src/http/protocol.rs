//! Supported URL schemes and their default ports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Supported protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn all() -> &'static [Protocol] {
        &[Protocol::Http, Protocol::Https]
    }

    /// Lower case scheme name
    pub fn scheme_name(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn uses_tls(&self) -> bool {
        matches!(self, Protocol::Https)
    }

    /// Resolve a scheme name, ignoring case
    pub fn from_scheme_name(scheme: &str) -> Result<Self, ConfigError> {
        let lower = scheme.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|p| p.scheme_name() == lower)
            .ok_or_else(|| ConfigError::UnsupportedScheme(scheme.to_string()))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme_name())
    }
}
