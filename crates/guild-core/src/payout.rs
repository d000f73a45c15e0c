//! # Payout Split
//!
//! Divides a gross amount between the platform and an agreement's recipients,
//! cent-exact.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compute_payouts(total = 2000, fee = 10%, splits = [70%, 30%])          │
//! │                                                                         │
//! │  1. fee           = round(10% × 2000)        = 200                     │
//! │  2. distributable = 2000 - 200               = 1800                    │
//! │  3. allocations   = round(70% × 1800) = 1260                           │
//! │                     round(30% × 1800) =  540                           │
//! │  4. remainder     = 1800 - (1260 + 540)      = 0                       │
//! │     (non-zero remainder → added to the LARGEST allocation,             │
//! │      first in input order on ties; may be negative)                    │
//! │                                                                         │
//! │  Result: fee + Σ allocations == total, always                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The remainder policy is part of the payout contract: recipients' totals
//! depend on it to the cent, so it must not be swapped for another fair
//! rounding scheme.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Rate};
use crate::types::CollabSplit;

// =============================================================================
// Types
// =============================================================================

/// One recipient's share of a single split computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitAllocation {
    pub recipient_id: String,
    pub amount_cents: i64,
}

impl SplitAllocation {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Result of splitting one gross amount.
///
/// `allocations` keeps the input order of the splits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBreakdown {
    pub total_cents: i64,
    pub fee_cents: i64,
    pub distributable_cents: i64,
    pub allocations: Vec<SplitAllocation>,
}

impl PayoutBreakdown {
    #[inline]
    pub fn fee(&self) -> Money {
        Money::from_cents(self.fee_cents)
    }

    /// Σ allocations.
    pub fn allocated(&self) -> Money {
        self.allocations.iter().map(SplitAllocation::amount).sum()
    }
}

// =============================================================================
// Split Algorithm
// =============================================================================

/// Splits `total` into a platform fee and one allocation per split.
///
/// ## Example
/// ```rust
/// use guild_core::money::{Money, Rate};
/// use guild_core::payout::compute_payouts;
/// use guild_core::types::CollabSplit;
///
/// let splits = [
///     CollabSplit::new("a", Rate::from_bps(3333)),
///     CollabSplit::new("b", Rate::from_bps(3333)),
///     CollabSplit::new("c", Rate::from_bps(3334)),
/// ];
/// let result = compute_payouts(Money::from_cents(1000), Rate::from_bps(1000), &splits);
///
/// assert_eq!(result.fee_cents, 100);
/// assert_eq!(result.fee() + result.allocated(), Money::from_cents(1000));
/// ```
pub fn compute_payouts(total: Money, fee_rate: Rate, splits: &[CollabSplit]) -> PayoutBreakdown {
    let fee = total.share(fee_rate);
    let distributable = total - fee;

    let mut allocations: Vec<SplitAllocation> = splits
        .iter()
        .map(|split| SplitAllocation {
            recipient_id: split.user_id.clone(),
            amount_cents: distributable.share(split.percent()).cents(),
        })
        .collect();

    let allocated: Money = allocations.iter().map(SplitAllocation::amount).sum();
    let remainder = distributable - allocated;

    if !remainder.is_zero() {
        if let Some(index) = largest_allocation(&allocations) {
            allocations[index].amount_cents += remainder.cents();
        }
    }

    PayoutBreakdown {
        total_cents: total.cents(),
        fee_cents: fee.cents(),
        distributable_cents: distributable.cents(),
        allocations,
    }
}

/// Index of the largest allocation; the earliest one wins a tie.
fn largest_allocation(allocations: &[SplitAllocation]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, allocation) in allocations.iter().enumerate() {
        match best {
            Some(b) if allocation.amount_cents <= allocations[b].amount_cents => {}
            _ => best = Some(index),
        }
    }
    best
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn split(user: &str, bps: u32) -> CollabSplit {
        CollabSplit::new(user, Rate::from_bps(bps))
    }

    fn amounts(breakdown: &PayoutBreakdown) -> Vec<i64> {
        breakdown.allocations.iter().map(|a| a.amount_cents).collect()
    }

    #[test]
    fn test_owner_only_limited_sale() {
        // Three units at $5.00, 10% fee, no agreement.
        let result = compute_payouts(
            Money::from_cents(1500),
            Rate::from_bps(1000),
            &[CollabSplit::sole_owner("owner")],
        );

        assert_eq!(result.fee_cents, 150);
        assert_eq!(amounts(&result), vec![1350]);
    }

    #[test]
    fn test_seventy_thirty_agreement() {
        let result = compute_payouts(
            Money::from_cents(2000),
            Rate::from_bps(1000),
            &[split("owner", 7000), split("collaborator", 3000)],
        );

        assert_eq!(result.fee_cents, 200);
        assert_eq!(result.distributable_cents, 1800);
        assert_eq!(amounts(&result), vec![1260, 540]);
    }

    #[test]
    fn test_positive_remainder_goes_to_largest() {
        // 333.3 → 333 each = 999, remainder +1
        let result = compute_payouts(
            Money::from_cents(1000),
            Rate::zero(),
            &[split("a", 3333), split("b", 3333), split("c", 3334)],
        );

        // all three tie at 333, first occurrence wins
        assert_eq!(amounts(&result), vec![334, 333, 333]);
        assert_eq!(result.allocated().cents(), 1000);
    }

    #[test]
    fn test_negative_remainder_comes_from_largest() {
        // 101 × 50% = 50.5 → 51 each = 102, remainder -1
        let result = compute_payouts(
            Money::from_cents(101),
            Rate::zero(),
            &[split("a", 5000), split("b", 5000)],
        );

        assert_eq!(amounts(&result), vec![50, 51]);
        assert_eq!(result.allocated().cents(), 101);
    }

    #[test]
    fn test_remainder_prefers_strictly_largest_over_position() {
        // 5 × 30% = 1.5 → 2, 5 × 70% = 3.5 → 4; sum 6, remainder -1 → b
        let result = compute_payouts(
            Money::from_cents(5),
            Rate::zero(),
            &[split("a", 3000), split("b", 7000)],
        );

        assert_eq!(amounts(&result), vec![2, 3]);
    }

    #[test]
    fn test_zero_total() {
        let result = compute_payouts(Money::zero(), Rate::from_bps(1000), &[split("a", 10_000)]);
        assert_eq!(result.fee_cents, 0);
        assert_eq!(amounts(&result), vec![0]);
    }

    #[test]
    fn test_empty_splits_keep_fee_only() {
        let result = compute_payouts(Money::from_cents(1000), Rate::from_bps(1000), &[]);
        assert_eq!(result.fee_cents, 100);
        assert!(result.allocations.is_empty());
    }

    #[test]
    fn test_conservation_across_amounts_and_rates() {
        let split_sets = [
            vec![split("a", 10_000)],
            vec![split("a", 7000), split("b", 3000)],
            vec![split("a", 3333), split("b", 3333), split("c", 3334)],
            vec![split("a", 3333), split("b", 3333), split("c", 3333)],
            vec![split("a", 1), split("b", 9999)],
            vec![split("a", 2500), split("b", 2500), split("c", 2500), split("d", 2550)],
        ];

        for total in [0_i64, 1, 7, 99, 101, 1000, 1999, 12_345, 987_654_321] {
            for fee_bps in [0_u32, 250, 1000, 1250, 3333, 10_000] {
                for splits in &split_sets {
                    let result = compute_payouts(
                        Money::from_cents(total),
                        Rate::from_bps(fee_bps),
                        splits,
                    );
                    assert_eq!(
                        result.fee_cents + result.allocated().cents(),
                        total,
                        "total={total} fee_bps={fee_bps} splits={splits:?}"
                    );
                }
            }
        }
    }
}
