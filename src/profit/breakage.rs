//! Breakage coefficient
//!
//! When a deposit is withdrawn before maturity, the accrued profit is
//! scaled down by a coefficient in `[floor, 1]`. The current policy is
//! linear in elapsed/term; the floor keeps a token payout even for a
//! withdrawal on day one.

use rust_decimal::Decimal;

/// Coefficient applied to early-withdrawal profit. Linear in the share
/// of the term actually served, clamped to `[floor, 1]`.
pub fn coefficient(term_days: i64, elapsed_days: i64, floor: Decimal) -> Decimal {
    if term_days <= 0 || elapsed_days >= term_days {
        return Decimal::ONE;
    }

    let served = Decimal::from(elapsed_days.max(0)) / Decimal::from(term_days);
    served.clamp(floor, Decimal::ONE)
}
