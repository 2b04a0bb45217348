//! In-memory quote source
//!
//! Serves whatever quote was last stored per symbol. Used by the demo binary
//! and by tests in place of a live oracle client.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::oracle::sources::{QuoteSource, SourceError};
use crate::oracle::Quote;
use crate::types::PriceSource;

pub struct StaticQuoteSource {
    source: PriceSource,
    quotes: RwLock<HashMap<String, Quote>>,
}

impl StaticQuoteSource {
    pub fn new(source: PriceSource) -> Self {
        Self {
            source,
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Builder-style variant of `set_quote`
    pub fn with_quote(self, symbol: impl Into<String>, quote: Quote) -> Self {
        self.set_quote(symbol, quote);
        self
    }

    /// Replace the quote served for `symbol`
    pub fn set_quote(&self, symbol: impl Into<String>, quote: Quote) {
        let mut quotes = self.quotes.write().unwrap_or_else(|e| e.into_inner());
        quotes.insert(symbol.into(), quote);
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    fn source(&self) -> PriceSource {
        self.source
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let quotes = self.quotes.read().unwrap_or_else(|e| e.into_inner());
        quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::UnknownSymbol(symbol.to_string()))
    }
}
