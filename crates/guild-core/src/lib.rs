//! # guild-core: Pure Business Logic for Guild Commerce
//!
//! This crate is the **heart** of the commerce core. It contains every rule
//! that has to be exact (money, splits, supply, capacity) as pure functions
//! with zero I/O dependencies.
//!
//! ```text
//!   HTTP boundary (not in this workspace)
//!        │
//!   guild-commerce ── services: catalog, collabs, checkout, settlement,
//!        │            events, venues, qr, reviews, discovery
//!        │
//!   guild-core ────── this crate: types + arithmetic + rules, no I/O
//!        │
//!   guild-db ──────── SQLite, migrations, conditional updates
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Artifact, Order, Ticket, etc.)
//! - [`money`] - Money and Rate with integer arithmetic (no floating point!)
//! - [`payout`] - The payout split algorithm
//! - [`settlement`] - Turning a paid order into fees, payouts and supply deltas
//! - [`catalog`] - Artifact visibility, edit rights and supply rules
//! - [`ticketing`] - Ticket issuance and redemption rules
//! - [`review`] - Review aggregation and discovery ranking
//! - [`age`] - Legal age checks
//! - [`error`] - `CoreError` and `ValidationError`
//! - [`validation`] - Input validation
//!
//! ## Example
//!
//! ```rust
//! use guild_core::money::{Money, Rate};
//! use guild_core::payout::compute_payouts;
//! use guild_core::types::CollabSplit;
//!
//! let splits = vec![
//!     CollabSplit::new("owner", Rate::from_bps(7000)),
//!     CollabSplit::new("collaborator", Rate::from_bps(3000)),
//! ];
//!
//! let breakdown = compute_payouts(Money::from_cents(2000), Rate::from_bps(1000), &splits);
//! assert_eq!(breakdown.fee_cents, 200);
//! assert_eq!(breakdown.allocations[0].amount_cents, 1260);
//! assert_eq!(breakdown.allocations[1].amount_cents, 540);
//! ```

pub mod age;
pub mod catalog;
pub mod error;
pub mod money;
pub mod payout;
pub mod review;
pub mod settlement;
pub mod ticketing;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

/// Platform fee applied when no configuration overrides it (10%).
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 1000;

/// Reference amount used for the agreement payout preview ($100.00).
///
/// The preview is illustrative only and never persisted.
pub const PREVIEW_REFERENCE_CENTS: i64 = 10_000;

/// Fee rate used for the agreement payout preview (10%).
pub const PREVIEW_FEE_BPS: u32 = 1000;

/// Default currency for artifacts and payment intents.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Number of entries returned by each discovery feed.
pub const DISCOVERY_LIMIT: usize = 10;
