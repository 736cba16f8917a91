//! Payout Calculator
//!
//! Pure integer arithmetic in minor currency units, round-half-even.
//! Commission is charged on winnings only, never on the loser's forfeited
//! stake. Conservation holds for every breakdown:
//! `winner_payout + commission + loser_refund == winner_stake + loser_stake`.

use serde::{Deserialize, Serialize};

/// Round `num / den` to the nearest integer, ties to even (banker's
/// rounding). `den` must be positive; our inputs are non-negative.
pub fn round_half_even(num: i128, den: i128) -> i64 {
    round_half_even_wide(num, den) as i64
}

/// Wide variant: callers that can exceed i64 cap the result in i128 first.
fn round_half_even_wide(num: i128, den: i128) -> i128 {
    debug_assert!(den > 0);
    debug_assert!(num >= 0);
    let quotient = num / den;
    let remainder = num % den;
    let doubled = remainder * 2;
    if doubled > den {
        quotient + 1
    } else if doubled < den {
        quotient
    } else if quotient % 2 == 0 {
        quotient
    } else {
        quotient + 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutBreakdown {
    /// Winner's stake back plus winnings, net of commission.
    pub winner_payout: i64,
    /// Platform commission, deducted from winnings.
    pub commission: i64,
    /// Gross winnings before commission.
    pub winnings: i64,
    /// Un-won portion of the loser's stake, returned to the loser.
    /// Zero at even money; positive only when odds shrink the winnings.
    pub loser_refund: i64,
}

impl PayoutBreakdown {
    pub fn total_pot(&self) -> i64 {
        self.winner_payout + self.commission + self.loser_refund
    }
}

/// Winnings are the loser's stake at even money, or the odds-weighted
/// multiple of the winner's stake (milli-odds, 1000 = even), capped at the
/// loser's locked stake so the pot can never be overdrawn.
pub fn compute_payout(
    winner_stake: i64,
    loser_stake: i64,
    odds_milli: Option<i64>,
    commission_rate_bps: u32,
) -> PayoutBreakdown {
    let winnings = match odds_milli {
        None => loser_stake,
        // Cap before narrowing: the odds-weighted product can exceed i64.
        Some(odds) => round_half_even_wide(winner_stake as i128 * odds as i128, 1000)
            .min(loser_stake as i128) as i64,
    };
    let commission = round_half_even(
        winnings as i128 * commission_rate_bps as i128,
        10_000,
    );
    PayoutBreakdown {
        winner_payout: winner_stake + winnings - commission,
        commission,
        winnings,
        loser_refund: loser_stake - winnings,
    }
}
