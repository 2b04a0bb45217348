//! Per-instrument acceptance thresholds

use serde::Serialize;
use thiserror::Error;

/// Invalid policy parameters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("min_sources must be at least 2, got {0}")]
    TooFewSources(usize),

    #[error("max_staleness_secs must be non-negative, got {0}")]
    NegativeStaleness(i64),
}

/// Thresholds a batch of quotes must satisfy.
///
/// Ratios are expressed in basis points (1 bps = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Policy {
    max_staleness_secs: i64,
    max_confidence_bps: u64,
    max_deviation_bps: u64,
    min_sources: usize,
}

impl Policy {
    pub fn new(
        max_staleness_secs: i64,
        max_confidence_bps: u64,
        max_deviation_bps: u64,
        min_sources: usize,
    ) -> Result<Self, PolicyError> {
        if min_sources < 2 {
            return Err(PolicyError::TooFewSources(min_sources));
        }
        if max_staleness_secs < 0 {
            return Err(PolicyError::NegativeStaleness(max_staleness_secs));
        }

        Ok(Self {
            max_staleness_secs,
            max_confidence_bps,
            max_deviation_bps,
            min_sources,
        })
    }

    /// Maximum quote age in seconds
    pub fn max_staleness_secs(&self) -> i64 {
        self.max_staleness_secs
    }

    /// Maximum `uncertainty / value`, in basis points
    pub fn max_confidence_bps(&self) -> u64 {
        self.max_confidence_bps
    }

    /// Maximum `|value - median| / median`, in basis points
    pub fn max_deviation_bps(&self) -> u64 {
        self.max_deviation_bps
    }

    /// Minimum admissible quotes needed for a consensus
    pub fn min_sources(&self) -> usize {
        self.min_sources
    }

    /// Same policy with a different deviation tolerance
    pub fn with_max_deviation_bps(self, max_deviation_bps: u64) -> Self {
        Self {
            max_deviation_bps,
            ..self
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_staleness_secs: 60,    // 1 minute
            max_confidence_bps: 10_000, // 100%
            max_deviation_bps: 500,    // 5%
            min_sources: 2,
        }
    }
}
