//! Consensus Validator - median consensus over screened quotes
//!
//! Evaluation runs in two phases. Every quote is screened first; only the
//! survivors are normalized to the finest exponent in the batch, sorted, and
//! reduced to their median. Each survivor must then sit within
//! `max_deviation_bps` of that median or the whole batch is rejected, naming
//! the survivor furthest from it.
//!
//! Deviation is measured against the median itself rather than a spread
//! estimate such as the median absolute deviation.

use super::fixed::{exceeds_bps, ratio_bps, rescale};
use super::policy::Policy;
use super::quote::Quote;
use super::screen::screen_quote;
use super::verdict::{Consensus, Rejection, Verdict};
use crate::types::PriceSource;

/// Evaluate a batch of quotes for one instrument.
///
/// Pure: the same quotes, policy and `now` always give the same verdict.
pub fn validate_consensus(quotes: &[Quote], policy: &Policy, now: i64) -> Verdict {
    evaluate(quotes, policy, now).into()
}

fn evaluate(quotes: &[Quote], policy: &Policy, now: i64) -> Result<Consensus, Rejection> {
    let admissible = screen_batch(quotes, policy, now)?;

    let exponent = admissible
        .iter()
        .map(|q| q.exponent())
        .min()
        .unwrap_or_default();
    let normalized: Vec<u128> = admissible
        .iter()
        .map(|q| scale_to(q, exponent))
        .collect();

    let mut sorted = normalized.clone();
    sorted.sort_unstable();
    let Some(median) = median(&sorted) else {
        return Err(Rejection::InsufficientSources {
            admissible: 0,
            required: policy.min_sources(),
            screened_out: Vec::new(),
        });
    };

    // Every distance shares the median as denominator, so the largest
    // distance is the largest ratio. Ties go to the lowest source.
    let worst = admissible
        .iter()
        .zip(&normalized)
        .map(|(quote, &value)| (value.abs_diff(median), quote.source()))
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

    if let Some((distance, oracle)) = worst {
        if exceeds_bps(distance, median, policy.max_deviation_bps()) {
            let rejection = Rejection::DeviationExceeded {
                oracle,
                deviation_bps: ratio_bps(distance, median),
                max_deviation_bps: policy.max_deviation_bps(),
            };
            tracing::warn!(source = %oracle, reason = %rejection, "Batch rejected");
            return Err(rejection);
        }
    }

    let mut contributing_sources: Vec<PriceSource> =
        admissible.iter().map(|q| q.source()).collect();
    contributing_sources.sort_unstable();

    let consensus = Consensus {
        value: median,
        exponent,
        contributing_sources,
    };
    tracing::debug!(
        value = %consensus,
        exponent,
        sources = admissible.len(),
        "Consensus reached"
    );
    Ok(consensus)
}

/// Screen every quote before any aggregation happens.
///
/// A zero price rejects the batch outright, naming the lowest zero-priced
/// source; stale and low-confidence quotes are dropped and reported, ordered
/// by source, if too few survive.
fn screen_batch<'a>(
    quotes: &'a [Quote],
    policy: &Policy,
    now: i64,
) -> Result<Vec<&'a Quote>, Rejection> {
    let mut admissible = Vec::with_capacity(quotes.len());
    let mut screened_out = Vec::new();
    let mut unavailable: Option<Rejection> = None;

    for quote in quotes {
        match screen_quote(quote, policy, now) {
            Ok(()) => admissible.push(quote),
            Err(rejection @ Rejection::Unavailable { .. }) => {
                if unavailable
                    .as_ref()
                    .map_or(true, |seen| rejection.offending_source() < seen.offending_source())
                {
                    unavailable = Some(rejection);
                }
            }
            Err(rejection) => {
                tracing::warn!(source = %quote.source(), reason = %rejection, "Quote screened out");
                screened_out.push(rejection);
            }
        }
    }

    if let Some(rejection) = unavailable {
        tracing::warn!(reason = %rejection, "Batch rejected");
        return Err(rejection);
    }

    if admissible.len() < policy.min_sources() {
        screened_out.sort_by_key(Rejection::offending_source);
        return Err(Rejection::InsufficientSources {
            admissible: admissible.len(),
            required: policy.min_sources(),
            screened_out,
        });
    }

    Ok(admissible)
}

/// Quote value at `exponent`, which must be no coarser than the quote's own.
///
/// Quote exponents are bounded at construction, so the shift never exceeds
/// 18 digits and the product always fits.
fn scale_to(quote: &Quote, exponent: i32) -> u128 {
    rescale(u128::from(quote.value()), quote.exponent(), exponent).unwrap_or(u128::MAX)
}

/// Median of sorted values; even counts take the truncated mean of the middle pair
pub(super) fn median(sorted: &[u128]) -> Option<u128> {
    let len = sorted.len();
    if len == 0 {
        return None;
    }
    let mid = len / 2;
    if len % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::verdict::RejectionKind;

    const NOW: i64 = 1_700_000_000;

    fn make_quote(source: PriceSource, value: i64, exponent: i32) -> Quote {
        Quote::new(source, value, 0, exponent, NOW - 5).unwrap()
    }

    fn policy(max_deviation_bps: u64) -> Policy {
        Policy::new(300, 100, max_deviation_bps, 2).unwrap()
    }

    #[test]
    fn test_two_sources_average_to_midpoint() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 50000_00000000, -8),
            make_quote(PriceSource::Switchboard, 50025_00000000, -8),
        ];

        let verdict = validate_consensus(&quotes, &policy(50), NOW);
        let consensus = verdict.consensus().unwrap();

        assert_eq!(consensus.value, 50012_50000000);
        assert_eq!(consensus.exponent, -8);
        assert_eq!(
            consensus.contributing_sources,
            vec![PriceSource::Pyth, PriceSource::Switchboard]
        );
    }

    #[test]
    fn test_equidistant_offenders_report_lowest_source() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 50000_00000000, -8),
            make_quote(PriceSource::Switchboard, 50025_00000000, -8),
        ];

        let verdict = validate_consensus(&quotes, &policy(1), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::DeviationExceeded {
                oracle: PriceSource::Pyth,
                deviation_bps: 2,
                max_deviation_bps: 1,
            })
        );
    }

    #[test]
    fn test_even_median_truncates() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 100, 0),
            make_quote(PriceSource::Switchboard, 101, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy(100), NOW);
        assert_eq!(verdict.consensus().map(|c| c.value), Some(100));
    }

    #[test]
    fn test_odd_median_ignores_outlier_magnitude() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 1_000, 0),
            make_quote(PriceSource::Switchboard, 1_001, 0),
            make_quote(PriceSource::Internal, 1_000_000, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy(50), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::DeviationExceeded {
                oracle: PriceSource::Internal,
                deviation_bps: 9_980_009,
                max_deviation_bps: 50,
            })
        );
    }

    #[test]
    fn test_largest_offender_is_reported_not_first() {
        // 104 breaks the 300 bps limit first in input order, 80 breaks it furthest
        let quotes = vec![
            make_quote(PriceSource::Internal, 104, 0),
            make_quote(PriceSource::Switchboard, 100, 0),
            make_quote(PriceSource::Pyth, 80, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy(300), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::DeviationExceeded {
                oracle: PriceSource::Pyth,
                deviation_bps: 2_000,
                max_deviation_bps: 300,
            })
        );
    }

    #[test]
    fn test_reversed_batch_gives_same_rejection() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 100, 0),
            make_quote(PriceSource::Switchboard, 110, 0),
        ];
        let reversed: Vec<Quote> = quotes.iter().rev().cloned().collect();

        let forward = validate_consensus(&quotes, &policy(100), NOW);
        let backward = validate_consensus(&reversed, &policy(100), NOW);

        assert_eq!(forward, backward);
        assert_eq!(
            forward.rejection().and_then(Rejection::offending_source),
            Some(PriceSource::Pyth)
        );
    }

    #[test]
    fn test_mixed_exponents_normalize_to_finest() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 50000_00, -2),
            make_quote(PriceSource::Switchboard, 50010_00000000, -8),
        ];

        let consensus = validate_consensus(&quotes, &policy(50), NOW)
            .into_result()
            .unwrap();

        assert_eq!(consensus.exponent, -8);
        assert_eq!(consensus.value, 50005_00000000);
    }

    #[test]
    fn test_zero_price_rejects_batch() {
        let quotes = vec![
            make_quote(PriceSource::Pyth, 50000, 0),
            make_quote(PriceSource::Switchboard, 50000, 0),
            make_quote(PriceSource::Internal, 0, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy(50), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::Unavailable {
                oracle: PriceSource::Internal
            })
        );
    }

    #[test]
    fn test_several_zero_prices_name_lowest_source() {
        let quotes = vec![
            make_quote(PriceSource::Internal, 0, 0),
            make_quote(PriceSource::Switchboard, 0, 0),
            make_quote(PriceSource::Pyth, 50000, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy(50), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::Unavailable {
                oracle: PriceSource::Switchboard
            })
        );
    }

    #[test]
    fn test_stale_source_leaves_too_few() {
        let stale = Quote::new(PriceSource::Switchboard, 50000, 0, 0, NOW - 400).unwrap();
        let quotes = vec![make_quote(PriceSource::Pyth, 50000, 0), stale];

        let verdict = validate_consensus(&quotes, &policy(50), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::InsufficientSources {
                admissible: 1,
                required: 2,
                screened_out: vec![Rejection::Stale {
                    oracle: PriceSource::Switchboard,
                    age_secs: 400,
                    max_staleness_secs: 300,
                }],
            })
        );
    }

    #[test]
    fn test_low_confidence_source_is_dropped_not_fatal() {
        let shaky = Quote::new(PriceSource::Internal, 90_000, 9_000, 0, NOW).unwrap();
        let quotes = vec![
            make_quote(PriceSource::Pyth, 50_000, 0),
            make_quote(PriceSource::Switchboard, 50_010, 0),
            shaky,
        ];

        let consensus = validate_consensus(&quotes, &policy(50), NOW)
            .into_result()
            .unwrap();

        assert_eq!(consensus.value, 50_005);
        assert_eq!(
            consensus.contributing_sources,
            vec![PriceSource::Pyth, PriceSource::Switchboard]
        );
    }

    #[test]
    fn test_insufficient_sources_checked_before_deviation() {
        let policy = Policy::new(300, 100, 0, 3).unwrap();
        let quotes = vec![
            make_quote(PriceSource::Pyth, 1, 0),
            make_quote(PriceSource::Switchboard, 1_000, 0),
        ];

        let verdict = validate_consensus(&quotes, &policy, NOW);
        assert_eq!(
            verdict.rejection_kind(),
            Some(RejectionKind::InsufficientSources)
        );
    }

    #[test]
    fn test_empty_batch_is_insufficient() {
        let verdict = validate_consensus(&[], &policy(50), NOW);
        assert_eq!(
            verdict.rejection(),
            Some(&Rejection::InsufficientSources {
                admissible: 0,
                required: 2,
                screened_out: vec![],
            })
        );
    }

    #[test]
    fn test_median_helper() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[7]), Some(7));
        assert_eq!(median(&[1, 2, 9]), Some(2));
        assert_eq!(median(&[1, 2, 4, 9]), Some(3));
    }
}
