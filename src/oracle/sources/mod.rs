//! Quote sources and the concurrent collector that fans out to them

mod collector;
mod fixed_source;

pub use collector::{Collection, QuoteCollector};
pub use fixed_source::StaticQuoteSource;

use async_trait::async_trait;
use thiserror::Error;

use crate::oracle::Quote;
use crate::types::PriceSource;

/// Source-specific acquisition failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed price data: {0}")]
    Format(String),

    #[error("no feed configured for {0}")]
    UnknownSymbol(String),

    #[error("no response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Trait for quote acquisition clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Which oracle this client reads
    fn source(&self) -> PriceSource;

    /// Fetch the latest quote for `symbol` (e.g. "BTC/USD")
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError>;
}
