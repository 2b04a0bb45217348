//! Oracle consensus demo
//!
//! Seeds in-memory Pyth, Switchboard and internal feeds with sample quotes,
//! collects them concurrently for every configured instrument and logs the
//! validator's verdict along with any manipulation alerts against the
//! previous round's consensus.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use oracle_consensus::config::AppConfig;
use oracle_consensus::oracle::sources::{QuoteCollector, QuoteSource, StaticQuoteSource};
use oracle_consensus::oracle::{
    detect_manipulation, screen_quote, validate_consensus, Consensus, ManipulationThresholds,
    Policy, Quote, Verdict,
};
use oracle_consensus::types::PriceSource;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(config = %config, "Starting oracle consensus validator");

    let now = chrono::Utc::now().timestamp();
    let sources = config
        .enabled_sources()?
        .into_iter()
        .map(|source| seeded_source(source, &config, now))
        .collect::<Result<Vec<_>>>()?;
    let collector = QuoteCollector::new(sources, config.source_timeout());

    let instruments = config
        .instruments
        .iter()
        .map(|i| {
            Ok(Instrument {
                symbol: i.symbol.clone(),
                policy: i.policy()?,
                thresholds: i.manipulation_thresholds(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut last_consensus: HashMap<String, Consensus> = HashMap::new();
    let interval = config.poll_interval();
    loop {
        run_round(&collector, &instruments, &mut last_consensus).await;

        let Some(interval) = interval else {
            break;
        };
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, stopping");
                break;
            }
        }
    }

    for health in collector.health() {
        info!(
            source = %health.source,
            healthy = health.is_healthy,
            success_rate = format!("{:.2}", health.success_rate()),
            avg_latency_ms = format!("{:.3}", health.average_latency_ms),
            "Source health"
        );
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

struct Instrument {
    symbol: String,
    policy: Policy,
    thresholds: ManipulationThresholds,
}

async fn run_round(
    collector: &QuoteCollector,
    instruments: &[Instrument],
    last_consensus: &mut HashMap<String, Consensus>,
) {
    let now = chrono::Utc::now().timestamp();

    for instrument in instruments {
        let symbol = &instrument.symbol;
        let collection = collector.collect(symbol).await;
        let verdict = validate_consensus(&collection.quotes, &instrument.policy, now);

        let admissible: Vec<Quote> = collection
            .quotes
            .into_iter()
            .filter(|q| screen_quote(q, &instrument.policy, now).is_ok())
            .collect();
        for alert in detect_manipulation(
            &admissible,
            last_consensus.get(symbol),
            &instrument.thresholds,
        ) {
            warn!(symbol = %symbol, alert = ?alert, "Possible manipulation");
        }

        let payload = match serde_json::to_string(&verdict) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Failed to serialize verdict");
                String::new()
            }
        };

        match &verdict {
            Verdict::Consensus(consensus) => {
                info!(symbol = %symbol, consensus = %consensus, payload = %payload, "Consensus accepted");
            }
            Verdict::Rejected(rejection) => match rejection.offending_source() {
                Some(source) => {
                    warn!(symbol = %symbol, source = %source, reason = %rejection, payload = %payload, "Consensus rejected");
                }
                None => {
                    error!(symbol = %symbol, reason = %rejection, payload = %payload, "Consensus rejected");
                }
            },
        }

        if let Verdict::Consensus(consensus) = verdict {
            last_consensus.insert(symbol.clone(), consensus);
        }
    }
}

/// Reference price, in whole dollars, for the sample feeds
fn sample_price(symbol: &str) -> i64 {
    match symbol {
        "BTC/USD" => 50_000,
        "ETH/USD" => 3_000,
        "SOL/USD" => 100,
        _ => 1,
    }
}

/// Build an in-memory source holding one sample quote per instrument.
///
/// Each source reports in its native representation: Pyth at 8 decimals,
/// Switchboard as a scale-8 decimal, the internal feed at 6 decimals.
fn seeded_source(source: PriceSource, config: &AppConfig, now: i64) -> Result<Arc<dyn QuoteSource>> {
    let client = StaticQuoteSource::new(source);

    for instrument in &config.instruments {
        let base = sample_price(&instrument.symbol);
        let quote = match source {
            // 0.01% confidence, published 10 seconds ago
            PriceSource::Pyth => Quote::from_pyth(base * 100_000_000, base as u64 * 10_000, -8, now - 10),
            // 0.05% above Pyth
            PriceSource::Switchboard => Quote::from_switchboard(
                base as i128 * 100_050_000,
                8,
                base as u64 * 20_000,
                now - 5,
            ),
            // 0.02% below Pyth
            PriceSource::Internal => Quote::new(source, base * 999_800, base as u64 * 100, -6, now),
        }
        .with_context(|| format!("Invalid sample quote for {} from {}", instrument.symbol, source))?;

        client.set_quote(instrument.symbol.clone(), quote);
    }

    Ok(Arc::new(client))
}
