//! Quote - one source's fixed-point price observation
//!
//! Quotes are validated when built and immutable afterwards. Value and
//! uncertainty share one exponent per quote; exponents may differ across
//! quotes in the same batch.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::PriceSource;

/// Finest exponent a quote may carry (18 decimal places)
pub const MIN_EXPONENT: i32 = -18;
/// Coarsest exponent a quote may carry (whole units)
pub const MAX_EXPONENT: i32 = 0;

/// Reasons a raw observation cannot become a `Quote`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("{oracle} reported a negative price mantissa: {mantissa}")]
    NegativePrice { oracle: PriceSource, mantissa: i128 },

    #[error("{oracle} reported a price mantissa that does not fit in 64 bits: {mantissa}")]
    MantissaOverflow { oracle: PriceSource, mantissa: i128 },

    #[error("{oracle} reported exponent {exponent}, outside [{}, {}]", MIN_EXPONENT, MAX_EXPONENT)]
    ExponentOutOfRange { oracle: PriceSource, exponent: i64 },
}

/// A single source's price observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    source: PriceSource,
    value: u64,
    uncertainty: u64,
    exponent: i32,
    observed_at: i64,
}

impl Quote {
    /// Build a quote from a signed mantissa.
    ///
    /// `value` and `uncertainty` are both expressed at `exponent`;
    /// `observed_at` is in seconds since the Unix epoch.
    pub fn new(
        source: PriceSource,
        value: i64,
        uncertainty: u64,
        exponent: i32,
        observed_at: i64,
    ) -> Result<Self, QuoteError> {
        if value < 0 {
            return Err(QuoteError::NegativePrice {
                oracle: source,
                mantissa: value as i128,
            });
        }
        Self::checked_exponent(source, exponent as i64)?;

        Ok(Self {
            source,
            value: value as u64,
            uncertainty,
            exponent,
            observed_at,
        })
    }

    /// Pyth-style record: `price * 10^expo` with a `conf` half-width
    pub fn from_pyth(price: i64, conf: u64, expo: i32, publish_time: i64) -> Result<Self, QuoteError> {
        Self::new(PriceSource::Pyth, price, conf, expo, publish_time)
    }

    /// Switchboard-style decimal: `mantissa / 10^scale`.
    ///
    /// The standard deviation mantissa is taken at the same scale and used
    /// as the uncertainty.
    pub fn from_switchboard(
        mantissa: i128,
        scale: u32,
        std_dev_mantissa: u64,
        timestamp: i64,
    ) -> Result<Self, QuoteError> {
        let oracle = PriceSource::Switchboard;
        if mantissa < 0 {
            return Err(QuoteError::NegativePrice { oracle, mantissa });
        }
        let value = i64::try_from(mantissa)
            .map_err(|_| QuoteError::MantissaOverflow { oracle, mantissa })?;
        let exponent = Self::checked_exponent(oracle, -(scale as i64))?;

        Self::new(oracle, value, std_dev_mantissa, exponent, timestamp)
    }

    fn checked_exponent(oracle: PriceSource, exponent: i64) -> Result<i32, QuoteError> {
        if exponent < MIN_EXPONENT as i64 || exponent > MAX_EXPONENT as i64 {
            return Err(QuoteError::ExponentOutOfRange { oracle, exponent });
        }
        Ok(exponent as i32)
    }

    pub fn source(&self) -> PriceSource {
        self.source
    }

    /// Price mantissa
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Confidence half-width mantissa, same exponent as `value`
    pub fn uncertainty(&self) -> u64 {
        self.uncertainty
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    /// Observation time in seconds since the Unix epoch
    pub fn observed_at(&self) -> i64 {
        self.observed_at
    }

    /// Age in seconds at `now`; negative for future-dated quotes
    pub fn age_at(&self, now: i64) -> i64 {
        now.saturating_sub(self.observed_at)
    }

    /// Price as a decimal, for display only
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.value as i128, self.exponent.unsigned_abs())
    }

    /// Uncertainty as a decimal, for display only
    pub fn uncertainty_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.uncertainty as i128, self.exponent.unsigned_abs())
    }
}
