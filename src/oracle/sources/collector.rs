//! Quote Collector - concurrent fan-out to every configured source
//!
//! Each source gets its own timeout. The collector waits until every source
//! has answered or timed out, records the outcome in that source's health,
//! and hands the surviving quotes to the validator.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::oracle::health::SourceHealth;
use crate::oracle::sources::{QuoteSource, SourceError};
use crate::oracle::{validate_consensus, Policy, Quote, Verdict};
use crate::types::PriceSource;

/// Quotes gathered for one symbol in one round
#[derive(Debug, Clone)]
pub struct Collection {
    pub symbol: String,
    pub quotes: Vec<Quote>,
    pub failures: Vec<(PriceSource, SourceError)>,
}

/// Fans out quote requests and tracks per-source health.
///
/// Expects at most one client per `PriceSource`; health is keyed by source.
pub struct QuoteCollector {
    sources: Vec<Arc<dyn QuoteSource>>,
    timeout: Duration,
    health: RwLock<HashMap<PriceSource, SourceHealth>>,
}

impl QuoteCollector {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, timeout: Duration) -> Self {
        let health = sources
            .iter()
            .map(|s| (s.source(), SourceHealth::new(s.source())))
            .collect();

        Self {
            sources,
            timeout,
            health: RwLock::new(health),
        }
    }

    /// Configured sources, in registration order
    pub fn sources(&self) -> Vec<PriceSource> {
        self.sources.iter().map(|s| s.source()).collect()
    }

    /// Request a quote for `symbol` from every source concurrently
    pub async fn collect(&self, symbol: &str) -> Collection {
        let timeout_ms = millis(self.timeout);

        let requests = self.sources.iter().map(|client| async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(self.timeout, client.fetch_quote(symbol)).await
            {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout { timeout_ms }),
            };
            (client.source(), result, started.elapsed())
        });
        let responses = join_all(requests).await;

        let now = chrono::Utc::now().timestamp();
        let mut quotes = Vec::with_capacity(responses.len());
        let mut failures = Vec::new();

        let mut health = self.health.write().unwrap_or_else(|e| e.into_inner());
        for (source, result, elapsed) in responses {
            let entry = health
                .entry(source)
                .or_insert_with(|| SourceHealth::new(source));

            let result = result.and_then(|quote| {
                if quote.source() == source {
                    Ok(quote)
                } else {
                    Err(SourceError::Format(format!(
                        "{} client returned a {} quote",
                        source,
                        quote.source()
                    )))
                }
            });

            match result {
                Ok(quote) => {
                    entry.record_success(elapsed.as_secs_f64() * 1000.0, now);
                    tracing::debug!(
                        source = %source,
                        symbol = %symbol,
                        price = %quote.to_decimal(),
                        latency_ms = millis(elapsed),
                        "Quote received"
                    );
                    quotes.push(quote);
                }
                Err(e) => {
                    entry.record_failure(e.to_string(), now);
                    tracing::warn!(source = %source, symbol = %symbol, error = %e, "Quote fetch failed");
                    failures.push((source, e));
                }
            }
        }

        Collection {
            symbol: symbol.to_string(),
            quotes,
            failures,
        }
    }

    /// Collect quotes for `symbol` and run them through the validator
    pub async fn evaluate(&self, symbol: &str, policy: &Policy, now: i64) -> Verdict {
        let collection = self.collect(symbol).await;
        validate_consensus(&collection.quotes, policy, now)
    }

    /// Health snapshot for every source, ordered by source
    pub fn health(&self) -> Vec<SourceHealth> {
        let health = self.health.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshot: Vec<SourceHealth> = health.values().cloned().collect();
        snapshot.sort_by_key(|h| h.source);
        snapshot
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
