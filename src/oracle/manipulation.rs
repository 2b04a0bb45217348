//! Manipulation heuristics
//!
//! Advisory checks run next to the validator. They never change a
//! `Verdict`; callers decide whether an alert is worth acting on.
//!
//! - a quote more than `max_move_bps` away from a reference consensus is a
//!   flash move;
//! - a batch whose relative spread around its median is below
//!   `min_dispersion_bps` looks coordinated.

use serde::Serialize;

use super::aggregator::median;
use super::fixed::{exceeds_bps, isqrt, ratio_bps, rescale};
use super::quote::Quote;
use super::verdict::Consensus;
use crate::types::PriceSource;

/// Thresholds for `detect_manipulation`, in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManipulationThresholds {
    /// Largest tolerated move away from the reference price
    pub max_move_bps: u64,
    /// Batches tighter than this spread are flagged; 0 disables the check
    pub min_dispersion_bps: u64,
}

impl Default for ManipulationThresholds {
    fn default() -> Self {
        Self {
            max_move_bps: 1_000,     // 10%
            min_dispersion_bps: 100, // 1%
        }
    }
}

/// Something a batch of quotes looks suspicious for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "alert", rename_all = "snake_case")]
pub enum ManipulationAlert {
    /// One source moved too far from the reference price
    FlashMove {
        oracle: PriceSource,
        move_bps: u64,
        max_move_bps: u64,
    },
    /// All sources agree more closely than independent feeds usually do
    SuspiciousConsensus {
        dispersion_bps: u64,
        min_dispersion_bps: u64,
        sources: usize,
    },
}

/// Inspect `quotes` against an optional earlier consensus.
///
/// Zero-priced quotes are ignored. Flash moves are reported in source
/// order, followed by at most one `SuspiciousConsensus`.
pub fn detect_manipulation(
    quotes: &[Quote],
    reference: Option<&Consensus>,
    thresholds: &ManipulationThresholds,
) -> Vec<ManipulationAlert> {
    let priced: Vec<&Quote> = quotes.iter().filter(|q| q.value() > 0).collect();
    if priced.is_empty() {
        return Vec::new();
    }

    let exponent = priced
        .iter()
        .map(|q| q.exponent())
        .chain(reference.map(|c| c.exponent))
        .min()
        .unwrap_or_default();
    let normalized: Vec<(PriceSource, u128)> = priced
        .iter()
        .map(|q| {
            let value = rescale(u128::from(q.value()), q.exponent(), exponent);
            (q.source(), value.unwrap_or(u128::MAX))
        })
        .collect();

    let mut alerts = Vec::new();

    if let Some(reference) = reference.and_then(|c| rescale(c.value, c.exponent, exponent)) {
        let mut moves: Vec<(PriceSource, u128)> = normalized
            .iter()
            .map(|&(source, value)| (source, value.abs_diff(reference)))
            .filter(|&(_, distance)| exceeds_bps(distance, reference, thresholds.max_move_bps))
            .collect();
        moves.sort_unstable();

        alerts.extend(moves.into_iter().map(|(oracle, distance)| {
            ManipulationAlert::FlashMove {
                oracle,
                move_bps: ratio_bps(distance, reference),
                max_move_bps: thresholds.max_move_bps,
            }
        }));
    }

    if normalized.len() > 1 {
        let dispersion_bps = dispersion_bps(&normalized);
        if dispersion_bps < thresholds.min_dispersion_bps {
            alerts.push(ManipulationAlert::SuspiciousConsensus {
                dispersion_bps,
                min_dispersion_bps: thresholds.min_dispersion_bps,
                sources: normalized.len(),
            });
        }
    }

    for alert in &alerts {
        tracing::debug!(alert = ?alert, "Manipulation heuristic triggered");
    }
    alerts
}

/// Root-mean-square distance from the median, in basis points of the median
fn dispersion_bps(values: &[(PriceSource, u128)]) -> u64 {
    let mut sorted: Vec<u128> = values.iter().map(|&(_, v)| v).collect();
    sorted.sort_unstable();
    let Some(center) = median(&sorted) else {
        return 0;
    };

    let sum_of_squares = sorted
        .iter()
        .map(|&v| {
            let bps = u128::from(ratio_bps(v.abs_diff(center), center));
            bps * bps
        })
        .fold(0u128, u128::saturating_add);

    let mean_square = sum_of_squares / sorted.len() as u128;
    u64::try_from(isqrt(mean_square)).unwrap_or(u64::MAX)
}
