//! Verdict - the terminal outcome of one consensus evaluation

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::PriceSource;

/// Accepted consensus price
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consensus {
    /// Median mantissa at `exponent`
    pub value: u128,
    /// Finest exponent present in the admissible batch
    pub exponent: i32,
    /// Sources that passed screening, in source order
    pub contributing_sources: Vec<PriceSource>,
}

impl Consensus {
    /// Consensus as a decimal, for display only.
    ///
    /// `None` when the mantissa exceeds the 96 bits `Decimal` can hold.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let mantissa = i128::try_from(self.value).ok()?;
        Decimal::try_from_i128_with_scale(mantissa, self.exponent.unsigned_abs()).ok()
    }
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(price) => write!(f, "{}", price)?,
            None => write!(f, "{}e{}", self.value, self.exponent)?,
        }
        write!(f, " from {} sources", self.contributing_sources.len())
    }
}

/// Rejection category, for callers that only need to branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectionKind {
    Stale,
    Unavailable,
    LowConfidence,
    InsufficientSources,
    DeviationExceeded,
}

/// Why a quote or a batch was refused
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason")]
pub enum Rejection {
    #[error("{oracle} quote is stale: {age_secs}s old, limit {max_staleness_secs}s")]
    Stale {
        oracle: PriceSource,
        age_secs: i64,
        max_staleness_secs: i64,
    },

    #[error("{oracle} reported a zero price")]
    Unavailable { oracle: PriceSource },

    #[error("{oracle} confidence interval is {confidence_bps} bps of price, limit {max_confidence_bps} bps")]
    LowConfidence {
        oracle: PriceSource,
        confidence_bps: u64,
        max_confidence_bps: u64,
    },

    #[error("{admissible} admissible sources, {required} required")]
    InsufficientSources {
        admissible: usize,
        required: usize,
        /// Screen failures that shrank the admissible set
        screened_out: Vec<Rejection>,
    },

    #[error("{oracle} deviates {deviation_bps} bps from the median, limit {max_deviation_bps} bps")]
    DeviationExceeded {
        oracle: PriceSource,
        deviation_bps: u64,
        max_deviation_bps: u64,
    },
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::Stale { .. } => RejectionKind::Stale,
            Rejection::Unavailable { .. } => RejectionKind::Unavailable,
            Rejection::LowConfidence { .. } => RejectionKind::LowConfidence,
            Rejection::InsufficientSources { .. } => RejectionKind::InsufficientSources,
            Rejection::DeviationExceeded { .. } => RejectionKind::DeviationExceeded,
        }
    }

    /// The source at fault, when a single one is
    pub fn offending_source(&self) -> Option<PriceSource> {
        match self {
            Rejection::Stale { oracle, .. }
            | Rejection::Unavailable { oracle }
            | Rejection::LowConfidence { oracle, .. }
            | Rejection::DeviationExceeded { oracle, .. } => Some(*oracle),
            Rejection::InsufficientSources { .. } => None,
        }
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    Consensus(Consensus),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_consensus(&self) -> bool {
        matches!(self, Verdict::Consensus(_))
    }

    pub fn consensus(&self) -> Option<&Consensus> {
        match self {
            Verdict::Consensus(consensus) => Some(consensus),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Consensus(_) => None,
            Verdict::Rejected(rejection) => Some(rejection),
        }
    }

    /// Shorthand for `rejection().map(Rejection::kind)`
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        self.rejection().map(Rejection::kind)
    }

    pub fn into_result(self) -> Result<Consensus, Rejection> {
        match self {
            Verdict::Consensus(consensus) => Ok(consensus),
            Verdict::Rejected(rejection) => Err(rejection),
        }
    }
}

impl From<Result<Consensus, Rejection>> for Verdict {
    fn from(result: Result<Consensus, Rejection>) -> Self {
        match result {
            Ok(consensus) => Verdict::Consensus(consensus),
            Err(rejection) => Verdict::Rejected(rejection),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Consensus(consensus) => write!(f, "CONSENSUS {}", consensus),
            Verdict::Rejected(rejection) => write!(f, "REJECTED {}", rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_consensus_decimal_and_display() {
        let consensus = Consensus {
            value: 50012_50000000,
            exponent: -8,
            contributing_sources: vec![PriceSource::Pyth, PriceSource::Switchboard],
        };

        assert_eq!(consensus.to_decimal(), Some(dec!(50012.5)));
        assert_eq!(consensus.to_string(), "50012.50000000 from 2 sources");
    }

    #[test]
    fn test_consensus_too_wide_for_decimal_falls_back() {
        let consensus = Consensus {
            value: u128::MAX,
            exponent: 0,
            contributing_sources: vec![],
        };
        assert_eq!(consensus.to_decimal(), None);
        assert!(consensus.to_string().starts_with(&u128::MAX.to_string()));
    }

    #[test]
    fn test_offending_source() {
        let stale = Rejection::Stale {
            oracle: PriceSource::Switchboard,
            age_secs: 400,
            max_staleness_secs: 300,
        };
        assert_eq!(stale.offending_source(), Some(PriceSource::Switchboard));
        assert_eq!(stale.kind(), RejectionKind::Stale);

        let insufficient = Rejection::InsufficientSources {
            admissible: 1,
            required: 2,
            screened_out: vec![stale],
        };
        assert_eq!(insufficient.offending_source(), None);
        assert_eq!(insufficient.kind(), RejectionKind::InsufficientSources);
    }

    #[test]
    fn test_verdict_result_conversions() {
        let rejection = Rejection::Unavailable {
            oracle: PriceSource::Pyth,
        };
        let verdict = Verdict::from(Err(rejection.clone()));

        assert!(!verdict.is_consensus());
        assert_eq!(verdict.rejection_kind(), Some(RejectionKind::Unavailable));
        assert_eq!(verdict.to_string(), "REJECTED Pyth reported a zero price");
        assert_eq!(verdict.into_result(), Err(rejection));
    }

    #[test]
    fn test_verdict_serializes_with_tags() {
        let verdict = Verdict::Rejected(Rejection::DeviationExceeded {
            oracle: PriceSource::Internal,
            deviation_bps: 120,
            max_deviation_bps: 100,
        });
        let json = serde_json::to_value(&verdict).unwrap();

        assert_eq!(json["verdict"], "rejected");
        assert_eq!(json["detail"]["reason"], "DeviationExceeded");
        assert_eq!(json["detail"]["oracle"], "Internal");
        assert_eq!(json["detail"]["deviation_bps"], 120);
    }
}
