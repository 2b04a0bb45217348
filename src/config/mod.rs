//! Configuration management
//!
//! Loads from TOML/YAML files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::oracle::{ManipulationThresholds, Policy, PolicyError};
use crate::types::PriceSource;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    /// Instruments to evaluate, each with its own policy
    #[serde(default = "default_instruments")]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Per-source request timeout in milliseconds
    pub source_timeout_ms: u64,
    /// Enabled sources ("pyth", "switchboard", "internal")
    pub sources: Vec<String>,
    /// Delay between evaluation rounds in milliseconds (0 = single round)
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Trading symbol (e.g., "BTC/USD")
    pub symbol: String,
    /// Maximum quote age in seconds
    #[serde(default = "default_max_staleness_secs")]
    pub max_staleness_secs: i64,
    /// Maximum confidence interval in basis points of price
    #[serde(default = "default_max_confidence_bps")]
    pub max_confidence_bps: u64,
    /// Maximum distance from the median in basis points
    #[serde(default = "default_max_deviation_bps")]
    pub max_deviation_bps: u64,
    /// Minimum admissible sources
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
    /// Move from the previous consensus flagged as a flash move, in basis points
    #[serde(default = "default_max_move_bps")]
    pub max_move_bps: u64,
    /// Spread below which agreement is flagged as suspicious (0 = off)
    #[serde(default = "default_min_dispersion_bps")]
    pub min_dispersion_bps: u64,
}

fn default_max_staleness_secs() -> i64 {
    60
}

fn default_max_confidence_bps() -> u64 {
    10_000 // 100%
}

fn default_max_deviation_bps() -> u64 {
    500 // 5%
}

fn default_min_sources() -> usize {
    2
}

fn default_max_move_bps() -> u64 {
    ManipulationThresholds::default().max_move_bps
}

fn default_min_dispersion_bps() -> u64 {
    ManipulationThresholds::default().min_dispersion_bps
}

fn default_instruments() -> Vec<InstrumentConfig> {
    ["BTC/USD", "ETH/USD", "SOL/USD"]
        .into_iter()
        .map(InstrumentConfig::with_defaults)
        .collect()
}

impl InstrumentConfig {
    pub fn with_defaults(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            max_staleness_secs: default_max_staleness_secs(),
            max_confidence_bps: default_max_confidence_bps(),
            max_deviation_bps: default_max_deviation_bps(),
            min_sources: default_min_sources(),
            max_move_bps: default_max_move_bps(),
            min_dispersion_bps: default_min_dispersion_bps(),
        }
    }

    pub fn manipulation_thresholds(&self) -> ManipulationThresholds {
        ManipulationThresholds {
            max_move_bps: self.max_move_bps,
            min_dispersion_bps: self.min_dispersion_bps,
        }
    }

    /// Validated policy for this instrument
    pub fn policy(&self) -> Result<Policy, PolicyError> {
        Policy::new(
            self.max_staleness_secs,
            self.max_confidence_bps,
            self.max_deviation_bps,
            self.min_sources,
        )
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (ORACLE_CONSENSUS_*)
            .add_source(Environment::with_prefix("ORACLE_CONSENSUS").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Load configuration from an in-memory TOML document layered over defaults
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Self::builder()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("collector.source_timeout_ms", 2000)?
            .set_default("collector.sources", vec!["pyth", "switchboard"])?
            .set_default("collector.poll_interval_ms", 0)?;
        Ok(builder)
    }

    fn finish(config: Config) -> Result<Self> {
        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject configurations the validator could never run with
    pub fn validate(&self) -> Result<()> {
        self.enabled_sources()?;

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if !seen.insert(instrument.symbol.as_str()) {
                bail!("Instrument {} is configured twice", instrument.symbol);
            }
            instrument
                .policy()
                .with_context(|| format!("Invalid policy for {}", instrument.symbol))?;
        }

        Ok(())
    }

    /// Parsed, de-duplicated source list
    pub fn enabled_sources(&self) -> Result<Vec<PriceSource>> {
        let mut sources = Vec::new();
        for name in &self.collector.sources {
            let Some(source) = PriceSource::from_str(name) else {
                bail!("Unknown price source: {}", name);
            };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            bail!("At least one price source must be enabled");
        }
        Ok(sources)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.collector.source_timeout_ms)
    }

    /// Delay between rounds, or `None` for a single round
    pub fn poll_interval(&self) -> Option<Duration> {
        match self.collector.poll_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        let symbols: Vec<&str> = self.instruments.iter().map(|i| i.symbol.as_str()).collect();
        format!(
            "sources={:?} timeout_ms={} instruments={:?}",
            self.collector.sources, self.collector.source_timeout_ms, symbols
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
