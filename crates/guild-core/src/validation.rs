//! # Validation Module
//!
//! Input validation utilities for Guild Commerce.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary                                                │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service (guild-commerce)                                     │
//! │  └── THIS MODULE: field and business-shape validation                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── PRIMARY KEY on qr_slugs (one namespace for all slugs)             │
//! │  ├── CHECK constraints on counters                                     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use guild_core::validation::{validate_slug, validate_quantity};
//!
//! assert!(validate_slug("aurora").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Rate;
use crate::types::{CollabSplit, SupplyClass};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted QR slug.
pub const MAX_SLUG_LEN: usize = 64;

/// Longest accepted title or name.
pub const MAX_TITLE_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a required text field is present and non-blank.
///
/// ## Example
/// ```rust
/// use guild_core::validation::validate_required;
///
/// assert!(validate_required("contactEmail", "ops@venue.test").is_ok());
/// assert!(validate_required("contactEmail", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

/// Validates a title or display name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_title(field: &str, value: &str) -> ValidationResult<()> {
    validate_required(field, value)?;

    if value.trim().chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TITLE_LEN,
        });
    }

    Ok(())
}

/// Validates a QR slug.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Only letters, numbers, hyphens and underscores
///
/// ## Example
/// ```rust
/// use guild_core::validation::validate_slug;
///
/// assert!(validate_slug("aurora").is_ok());
/// assert!(validate_slug("night-market_2").is_ok());
/// assert!(validate_slug("no spaces").is_err());
/// ```
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    if slug.is_empty() {
        return Err(ValidationError::required("qrSlug"));
    }

    if slug.len() > MAX_SLUG_LEN {
        return Err(ValidationError::TooLong {
            field: "qrSlug".to_string(),
            max: MAX_SLUG_LEN,
        });
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "qrSlug".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates an order or ticket quantity.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout: one cart line                                                │
/// │                                                                         │
/// │  { artifactId, quantity: 3 }                                           │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(3) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be greater than zero"      │
/// │       │                                                                 │
/// │       └── OK → supply check                                            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a fee rate in basis points (0% to 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > Rate::FULL.bps() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Validates a percentage as supplied by a caller (0 to 100, finite).
pub fn validate_percent(field: &str, pct: f64) -> ValidationResult<Rate> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(Rate::from_percentage(pct))
}

/// Validates a supply limit for the given class.
///
/// ## Rules
/// - RARE and LIMITED require a limit
/// - A limit must not be negative
/// - COMMON ignores the limit entirely (see [`crate::catalog::normalize_supply_limit`])
pub fn validate_supply(class: SupplyClass, limit: Option<i64>) -> ValidationResult<()> {
    if !class.is_constrained() {
        return Ok(());
    }

    match limit {
        None => Err(ValidationError::required("supplyLimit")),
        Some(l) if l < 0 => Err(ValidationError::OutOfRange {
            field: "supplyLimit".to_string(),
            min: 0,
            max: i64::MAX,
        }),
        Some(_) => Ok(()),
    }
}

/// Validates a review rating (1 to 5).
pub fn validate_rating(field: &str, rating: i64) -> ValidationResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: 5,
        });
    }
    Ok(())
}

/// Validates that an event does not end before it starts.
pub fn validate_time_window(start: DateTime<Utc>, end: DateTime<Utc>) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::InvalidFormat {
            field: "endTime".to_string(),
            reason: "must not be before startTime".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Split Validators
// =============================================================================

/// Validates a set of collaboration splits.
///
/// ## Rules
/// - At least one split
/// - Every split names a user
/// - Each share lies in 0%..=100%
/// - The shares total 100% once rounded to a whole percent
///
/// ```text
/// 33.33 + 33.33 + 33.33 = 99.99 → rounds to 100 ✓
/// 70.00 + 29.00         = 99.00 → rounds to 99  ✗
/// ```
///
/// Whatever the shares leave over is absorbed by the remainder correction
/// of the payout split, so conservation holds either way.
pub fn validate_splits(splits: &[CollabSplit]) -> ValidationResult<()> {
    if splits.is_empty() {
        return Err(ValidationError::required("splits"));
    }

    for split in splits {
        validate_required("splits.userId", &split.user_id)?;
        validate_rate_bps("splits.percent", split.percent_bps)?;
    }

    let total_bps: u64 = splits.iter().map(|s| s.percent_bps as u64).sum();

    // round(total / 100) == 100  ⇔  9950 <= total_bps < 10050
    if !(9_950..10_050).contains(&total_bps) {
        return Err(ValidationError::SplitsTotal {
            total_percent: total_bps as f64 / 100.0,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
