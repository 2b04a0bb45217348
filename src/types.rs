//! Core types shared across the validator and its collaborators
//!
//! Defines the price source identifiers quotes are tagged with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Price source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceSource {
    /// Pyth Network price feed
    Pyth,
    /// Switchboard aggregator
    Switchboard,
    /// In-house reference price
    Internal,
}

impl PriceSource {
    /// All known sources, in declaration order
    pub const ALL: [PriceSource; 3] = [
        PriceSource::Pyth,
        PriceSource::Switchboard,
        PriceSource::Internal,
    ];

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pyth" => Some(PriceSource::Pyth),
            "switchboard" | "sb" => Some(PriceSource::Switchboard),
            "internal" => Some(PriceSource::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Pyth => write!(f, "Pyth"),
            PriceSource::Switchboard => write!(f, "Switchboard"),
            PriceSource::Internal => write!(f, "Internal"),
        }
    }
}
