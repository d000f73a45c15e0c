//! # Money
//!
//! Every price, fee and payout is an integer number of cents. Every rate
//! (platform fee, collaborator split) is an integer number of basis points.
//! Floats appear only at the edge, where callers submit split percentages.
//!
//! ```text
//!   gross 1800¢ ── share(10.00%) ──► fee 180¢
//!        │
//!        └── 1620¢ distributable ── share(33.33%) ×3 ──► 540 + 540 + 540
//!                                                         (+ remainder to one)
//! ```
//!
//! ```rust
//! use guild_core::money::{Money, Rate};
//!
//! let line = Money::from_cents(500).multiply_quantity(3).unwrap();
//! assert_eq!(line.share(Rate::from_bps(1000)).cents(), 150);
//! assert!(Money::from_cents(500).multiply_quantity(i64::MAX / 100).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

/// An amount in cents. May be negative in intermediate arithmetic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `rate` of this amount, rounded half up.
    ///
    /// Computed as `floor((cents × bps + 5000) / 10000)` in i128. Floor
    /// division keeps negative amounts rounding toward +∞ too, so
    /// `x - x.share(r)` never drifts from the rounded share.
    ///
    /// ```text
    ///   1800 × 70.00% = 1260.0  → 1260
    ///    333 × 50.00% =  166.5  →  167
    ///   -333 × 50.00% = -166.5  → -166
    /// ```
    pub fn share(&self, rate: Rate) -> Money {
        let scaled = self.0 as i128 * rate.bps() as i128 + 5000;
        Money(scaled.div_euclid(10_000) as i64)
    }

    /// Line gross: unit price times quantity. `None` on overflow.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

/// `$12.34` style, for log lines.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// A fraction in basis points: 1000 = 10.00%, 10000 = 100%.
///
/// Split percentages carry at most two decimals, so every accepted input
/// maps to a whole number of basis points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    pub const FULL: Rate = Rate(10_000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// `33.33` → 3333 bps. Negative, zero or non-finite input gives zero;
    /// range checks live in [`crate::validation`].
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return Rate(0);
        }
        Rate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
