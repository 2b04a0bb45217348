//! Per-quote admissibility screen
//!
//! Checks one quote against the policy at a caller-supplied `now`:
//! - zero price → `Unavailable`
//! - older than `max_staleness_secs` → `Stale`
//! - `uncertainty / value` above `max_confidence_bps` → `LowConfidence`
//!
//! Future-dated quotes pass; only maximum age is bounded.

use super::fixed::{exceeds_bps, ratio_bps};
use super::policy::Policy;
use super::quote::Quote;
use super::verdict::Rejection;

/// Screen a single quote. Pure; never reads a clock.
pub fn screen_quote(quote: &Quote, policy: &Policy, now: i64) -> Result<(), Rejection> {
    let oracle = quote.source();

    if quote.value() == 0 {
        return Err(Rejection::Unavailable { oracle });
    }

    let age_secs = quote.age_at(now);
    if age_secs > policy.max_staleness_secs() {
        return Err(Rejection::Stale {
            oracle,
            age_secs,
            max_staleness_secs: policy.max_staleness_secs(),
        });
    }
    if age_secs < 0 {
        tracing::debug!(
            source = %oracle,
            age_secs,
            "Quote timestamp is ahead of evaluation time"
        );
    }

    let uncertainty = quote.uncertainty() as u128;
    let value = quote.value() as u128;
    if exceeds_bps(uncertainty, value, policy.max_confidence_bps()) {
        return Err(Rejection::LowConfidence {
            oracle,
            confidence_bps: ratio_bps(uncertainty, value),
            max_confidence_bps: policy.max_confidence_bps(),
        });
    }

    Ok(())
}
