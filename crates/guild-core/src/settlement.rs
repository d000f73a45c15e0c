//! # Settlement Planning
//!
//! Turns the lines of a PENDING order into everything settlement has to
//! write: the exact fee total, one payout per distinct recipient, and the
//! supply counters to bump.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order (PENDING)                                                        │
//! │    line 1: art-A × 3 @ 500  ──► splits(A) ──► fee₁, allocations₁       │
//! │    line 2: art-B × 1 @ 2000 ──► splits(B) ──► fee₂, allocations₂       │
//! │                                                                         │
//! │  plan_settlement()  ← THIS MODULE                                      │
//! │    fees     = fee₁ + fee₂                                              │
//! │    payouts  = allocations merged by recipient (first-seen order)       │
//! │    supply   = +3 for A if A is RARE/LIMITED                            │
//! │                                                                         │
//! │  guild-db applies the plan inside the settlement transaction           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each line is split independently, so the fee and allocations of a line
//! always sum to that line's gross. The order-level identity is therefore
//! `fees + Σ payouts == Σ line gross`.

use std::collections::HashMap;

use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Rate};
use crate::payout::{compute_payouts, SplitAllocation};
use crate::types::{Artifact, CollabAgreement, CollabSplit, OrderItem, SupplyClass};

// =============================================================================
// Input
// =============================================================================

/// One order line joined with the artifact state settlement needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementLine {
    pub artifact_id: String,
    pub supply_class: SupplyClass,
    pub quantity: i64,
    pub gross: Money,
    /// ACTIVE agreement splits, or 100% to the owner.
    pub splits: Vec<CollabSplit>,
}

impl SettlementLine {
    /// Joins an order line with its artifact and the artifact's ACTIVE agreement.
    ///
    /// Fails if the line gross does not fit in an `i64`.
    pub fn new(item: &OrderItem, artifact: &Artifact, agreement: Option<&CollabAgreement>) -> CoreResult<Self> {
        let splits = match agreement {
            Some(a) => a.splits.clone(),
            None => vec![CollabSplit::sole_owner(&artifact.owner_id)],
        };

        Ok(SettlementLine {
            artifact_id: artifact.id.clone(),
            supply_class: artifact.supply_class,
            quantity: item.quantity,
            gross: item.line_total()?,
            splits,
        })
    }
}

// =============================================================================
// Output
// =============================================================================

/// Units to add to an artifact's sold counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyIncrement {
    pub artifact_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub fees: Money,
    /// One entry per distinct recipient, in order of first appearance.
    pub payouts: Vec<SplitAllocation>,
    pub supply_increments: Vec<SupplyIncrement>,
}

impl SettlementPlan {
    /// Σ payouts.
    pub fn payout_total(&self) -> Money {
        self.payouts.iter().map(SplitAllocation::amount).sum()
    }

    /// Final order total: `subtotal + fees`.
    pub fn order_total(&self, subtotal: Money) -> CoreResult<Money> {
        subtotal
            .checked_add(self.fees)
            .ok_or_else(|| ValidationError::amount_overflow("totalCents").into())
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Computes the settlement plan for a set of order lines.
///
/// ## Example
/// ```rust
/// use guild_core::money::{Money, Rate};
/// use guild_core::settlement::{plan_settlement, SettlementLine};
/// use guild_core::types::{CollabSplit, SupplyClass};
///
/// let line = SettlementLine {
///     artifact_id: "art-1".into(),
///     supply_class: SupplyClass::Limited,
///     quantity: 3,
///     gross: Money::from_cents(1500),
///     splits: vec![CollabSplit::sole_owner("owner")],
/// };
///
/// let plan = plan_settlement(&[line], Rate::from_bps(1000));
/// assert_eq!(plan.fees.cents(), 150);
/// assert_eq!(plan.payouts[0].amount_cents, 1350);
/// assert_eq!(plan.supply_increments[0].quantity, 3);
/// ```
pub fn plan_settlement(lines: &[SettlementLine], fee_rate: Rate) -> SettlementPlan {
    let mut fees = Money::zero();
    let mut payouts: Vec<SplitAllocation> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut supply_increments = Vec::new();

    for line in lines {
        let breakdown = compute_payouts(line.gross, fee_rate, &line.splits);
        fees += breakdown.fee();

        for allocation in breakdown.allocations {
            match positions.get(&allocation.recipient_id) {
                Some(&index) => payouts[index].amount_cents += allocation.amount_cents,
                None => {
                    positions.insert(allocation.recipient_id.clone(), payouts.len());
                    payouts.push(allocation);
                }
            }
        }

        if line.supply_class.is_constrained() {
            supply_increments.push(SupplyIncrement {
                artifact_id: line.artifact_id.clone(),
                quantity: line.quantity,
            });
        }
    }

    SettlementPlan {
        fees,
        payouts,
        supply_increments,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn line(id: &str, class: SupplyClass, qty: i64, unit: i64, splits: Vec<CollabSplit>) -> SettlementLine {
        SettlementLine {
            artifact_id: id.to_string(),
            supply_class: class,
            quantity: qty,
            gross: Money::from_cents(unit * qty),
            splits,
        }
    }

    #[test]
    fn test_same_recipient_across_lines_is_merged() {
        let lines = vec![
            line("a", SupplyClass::Common, 1, 1000, vec![CollabSplit::sole_owner("maya")]),
            line(
                "b",
                SupplyClass::Common,
                1,
                2000,
                vec![
                    CollabSplit::new("maya", Rate::from_bps(7000)),
                    CollabSplit::new("jun", Rate::from_bps(3000)),
                ],
            ),
        ];

        let plan = plan_settlement(&lines, Rate::from_bps(1000));

        assert_eq!(plan.fees.cents(), 300);
        assert_eq!(plan.payouts.len(), 2);
        assert_eq!(plan.payouts[0].recipient_id, "maya");
        assert_eq!(plan.payouts[0].amount_cents, 900 + 1260);
        assert_eq!(plan.payouts[1].recipient_id, "jun");
        assert_eq!(plan.payouts[1].amount_cents, 540);
    }

    #[test]
    fn test_only_constrained_supply_is_incremented() {
        let owner = || vec![CollabSplit::sole_owner("o")];
        let lines = vec![
            line("common", SupplyClass::Common, 2, 100, owner()),
            line("rare", SupplyClass::Rare, 1, 100, owner()),
            line("limited", SupplyClass::Limited, 4, 100, owner()),
        ];

        let plan = plan_settlement(&lines, Rate::zero());

        let ids: Vec<&str> = plan.supply_increments.iter().map(|s| s.artifact_id.as_str()).collect();
        assert_eq!(ids, vec!["rare", "limited"]);
        assert_eq!(plan.supply_increments[1].quantity, 4);
    }

    #[test]
    fn test_fees_plus_payouts_equal_gross() {
        let lines = vec![
            line("a", SupplyClass::Common, 3, 333, vec![CollabSplit::sole_owner("x")]),
            line(
                "b",
                SupplyClass::Common,
                7,
                101,
                vec![
                    CollabSplit::new("x", Rate::from_bps(3333)),
                    CollabSplit::new("y", Rate::from_bps(3333)),
                    CollabSplit::new("z", Rate::from_bps(3334)),
                ],
            ),
        ];
        let gross: Money = lines.iter().map(|l| l.gross).sum();

        let plan = plan_settlement(&lines, Rate::from_bps(1250));

        assert_eq!(plan.fees + plan.payout_total(), gross);
        assert_eq!(plan.order_total(gross).unwrap(), gross + plan.fees);
    }

    #[test]
    fn test_order_total_refuses_overflow() {
        let lines = vec![line("a", SupplyClass::Common, 1, 1000, vec![CollabSplit::sole_owner("x")])];
        let plan = plan_settlement(&lines, Rate::from_bps(1000));

        assert!(matches!(
            plan.order_total(Money::from_cents(i64::MAX)),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_empty_order_plans_nothing() {
        let plan = plan_settlement(&[], Rate::from_bps(1000));
        assert!(plan.fees.is_zero());
        assert!(plan.payouts.is_empty());
        assert!(plan.supply_increments.is_empty());
    }
}
