//! Fixed-point arithmetic for threshold checks
//!
//! Every ratio comparison is done on integers. Products that can exceed
//! `u128` are compared as 256-bit `(hi, lo)` pairs.

/// Basis points per unit
pub const BPS_SCALE: u64 = 10_000;

/// Multiply `a * b` into a 256-bit `(hi, lo)` pair
fn widening_mul(a: u128, b: u64) -> (u128, u128) {
    let b = b as u128;
    let a_lo = a & u64::MAX as u128;
    let a_hi = a >> 64;

    let lo_prod = a_lo * b;
    let hi_prod = a_hi * b;

    let (lo, carry) = lo_prod.overflowing_add(hi_prod << 64);
    let hi = (hi_prod >> 64) + carry as u128;
    (hi, lo)
}

/// Returns true when `numerator / denominator > max_bps / 10_000`
pub fn exceeds_bps(numerator: u128, denominator: u128, max_bps: u64) -> bool {
    widening_mul(numerator, BPS_SCALE) > widening_mul(denominator, max_bps)
}

/// `numerator / denominator` in basis points, truncated, saturating at `u64::MAX`
pub fn ratio_bps(numerator: u128, denominator: u128) -> u64 {
    if denominator == 0 {
        return u64::MAX;
    }
    numerator
        .checked_mul(BPS_SCALE as u128)
        .map(|scaled| scaled / denominator)
        .and_then(|bps| u64::try_from(bps).ok())
        .unwrap_or(u64::MAX)
}

/// Re-express `mantissa * 10^from` at the finer exponent `to`.
///
/// Returns `None` when `to > from` (that would drop digits) or the result
/// does not fit in `u128`.
pub fn rescale(mantissa: u128, from: i32, to: i32) -> Option<u128> {
    let shift = u32::try_from(from.checked_sub(to)?).ok()?;
    10u128.checked_pow(shift)?.checked_mul(mantissa)
}

/// Integer square root, rounded down
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // start from a power of two at or above the root and walk down
    let mut x = 1u128 << ((128 - n.leading_zeros() + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}
