//! Domain errors.
//!
//! ```text
//!   ValidationError ──► CoreError ──► DbError ──► ApiError
//!   (bad input)        (rule broken)  (guild-db)   (guild-commerce: code + message)
//! ```
//!
//! Messages name the entity involved; the API layer forwards them verbatim.

use thiserror::Error;

/// Business rule violations.
///
/// Every variant except `Validation` surfaces as a `BUSINESS_RULE` error at
/// the API boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Artifact has no price and cannot be ordered.
    #[error("Artifact {artifact_id} is not for sale")]
    NotForSale { artifact_id: String },

    /// Remaining supply of a constrained artifact cannot cover the request.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 3)
    ///      │
    ///      ▼
    /// Check supply: limit=10, sold=9 → remaining=1
    ///      │
    ///      ▼
    /// SoldOut { artifact_id, remaining: 1, requested: 3 }
    /// ```
    #[error("Artifact {artifact_id} is sold out")]
    SoldOut {
        artifact_id: String,
        remaining: i64,
        requested: i64,
    },

    /// Event has no ticket price set.
    #[error("Tickets for this event are not on sale")]
    TicketsNotOnSale { event_id: String },

    /// Issuing the requested tickets would exceed event capacity.
    #[error("Event is sold out")]
    EventSoldOut { event_id: String },

    /// Ticket was already redeemed.
    #[error("Ticket already used")]
    TicketAlreadyUsed { ticket_id: String },

    /// Ticket was refunded and can no longer be redeemed or refunded again.
    #[error("Ticket {ticket_id} was refunded")]
    TicketRefunded { ticket_id: String },

    /// Artifact owner disabled reviews.
    #[error("Reviews disabled for this artifact")]
    ReviewsDisabled { artifact_id: String },

    /// Owners cannot review their own work.
    #[error("Owners cannot review their own artifacts")]
    SelfReview { artifact_id: String },

    /// Order is not in a state that allows the requested operation.
    #[error("Order {order_id} is {status}, cannot perform operation")]
    InvalidOrderStatus { order_id: String, status: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Rejected caller input, checked before any state is touched.
///
/// `field` uses the camelCase wire name so clients can point at the input.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Absent, or blank after trimming.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Ratings, split percentages, quantities.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Slug alphabet, email shape, event end before start.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collaboration split percentages do not round to 100.
    #[error("Splits must total 100 percent (got {total_percent})")]
    SplitsTotal { total_percent: f64 },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// An amount in cents that no longer fits in an `i64`.
    pub fn amount_overflow(field: impl Into<String>) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min: 0,
            max: i64::MAX,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SoldOut {
            artifact_id: "art-1".to_string(),
            remaining: 1,
            requested: 3,
        };
        assert_eq!(err.to_string(), "Artifact art-1 is sold out");

        let err = CoreError::EventSoldOut {
            event_id: "evt-1".to_string(),
        };
        assert_eq!(err.to_string(), "Event is sold out");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::required("supplyLimit");
        assert_eq!(err.to_string(), "supplyLimit is required");

        let err = ValidationError::SplitsTotal { total_percent: 90.0 };
        assert_eq!(err.to_string(), "Splits must total 100 percent (got 90)");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("title").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
