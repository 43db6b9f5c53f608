//! Batch-size ladders

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Strictly increasing sequence of batch sizes probed against one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct BatchLadder {
    sizes: Vec<usize>,
}

impl BatchLadder {
    /// Ladder from explicit sizes
    pub fn explicit(sizes: Vec<usize>) -> Result<Self, ConfigError> {
        if sizes.is_empty() {
            return Err(invalid("batch ladder must contain at least one size"));
        }
        if sizes.contains(&0) {
            return Err(invalid("batch sizes must be at least 1"));
        }
        if sizes.windows(2).any(|w| w[1] <= w[0]) {
            return Err(invalid("batch sizes must be strictly increasing"));
        }

        Ok(Self { sizes })
    }

    /// `start, start*factor, ...` for `steps` steps
    pub fn geometric(start: usize, factor: usize, steps: usize) -> Result<Self, ConfigError> {
        if steps > 1 && factor < 2 {
            return Err(invalid("geometric ladder factor must be at least 2"));
        }

        let mut sizes = Vec::with_capacity(steps);
        let mut size = start;
        for step in 0..steps {
            if step > 0 {
                size = size
                    .checked_mul(factor)
                    .ok_or_else(|| invalid("geometric ladder overflows"))?;
            }
            sizes.push(size);
        }

        Self::explicit(sizes)
    }

    /// One-step ladder
    pub fn single(size: usize) -> Result<Self, ConfigError> {
        Self::explicit(vec![size])
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of ladder steps
    pub fn steps(&self) -> usize {
        self.sizes.len()
    }

    pub fn largest(&self) -> usize {
        self.sizes.last().copied().unwrap_or(0)
    }
}

impl Default for BatchLadder {
    fn default() -> Self {
        Self {
            sizes: vec![100, 1_000, 10_000],
        }
    }
}

impl TryFrom<Vec<usize>> for BatchLadder {
    type Error = ConfigError;

    fn try_from(sizes: Vec<usize>) -> Result<Self, Self::Error> {
        Self::explicit(sizes)
    }
}

impl From<BatchLadder> for Vec<usize> {
    fn from(ladder: BatchLadder) -> Self {
        ladder.sizes
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: "probe.batch_sizes".to_string(),
        reason: reason.to_string(),
    }
}
