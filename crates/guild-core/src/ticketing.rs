//! # Ticketing Rules
//!
//! Issuance preconditions and the ticket state machine. The capacity counter
//! itself is reserved atomically by guild-db; these functions decide what a
//! given status or event allows.

use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{Event, TicketStatus};
use crate::validation::validate_quantity;

/// Prefix of every ticket QR payload.
pub const TICKET_QR_PREFIX: &str = "tkt_";

/// Most tickets one request may issue, with or without an event capacity.
pub const MAX_TICKETS_PER_REQUEST: i64 = 100;

/// Generates a fresh, opaque ticket QR payload (`tkt_<32 hex>`).
pub fn new_ticket_qr_code() -> String {
    format!("{TICKET_QR_PREFIX}{}", Uuid::new_v4().simple())
}

/// Checks that tickets for `event` can be requested at all.
///
/// Capacity is not checked here; it is reserved atomically at issue time.
/// `quantity` must lie in `1..=MAX_TICKETS_PER_REQUEST`.
pub fn check_issuable(event: &Event, quantity: i64) -> CoreResult<()> {
    match event.ticket_price_cents {
        Some(price) if price > 0 => {}
        _ => {
            return Err(CoreError::TicketsNotOnSale {
                event_id: event.id.clone(),
            })
        }
    }

    validate_quantity(quantity)?;
    check_ticket_batch(quantity)?;
    Ok(())
}

/// Bounds one issuance request.
pub fn check_ticket_batch(quantity: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_TICKETS_PER_REQUEST).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_TICKETS_PER_REQUEST,
        });
    }
    Ok(())
}

/// Whether `live + quantity` tickets fit in the event.
#[inline]
pub fn fits_capacity(capacity: Option<i64>, live: i64, quantity: i64) -> bool {
    capacity.map_or(true, |cap| live + quantity <= cap)
}

/// VALID → USED. Anything else is refused.
pub fn check_redeemable(ticket_id: &str, status: TicketStatus) -> CoreResult<()> {
    match status {
        TicketStatus::Valid => Ok(()),
        TicketStatus::Used => Err(CoreError::TicketAlreadyUsed {
            ticket_id: ticket_id.to_string(),
        }),
        TicketStatus::Refunded => Err(CoreError::TicketRefunded {
            ticket_id: ticket_id.to_string(),
        }),
    }
}

/// VALID | USED → REFUNDED.
pub fn check_refundable(ticket_id: &str, status: TicketStatus) -> CoreResult<()> {
    match status {
        TicketStatus::Valid | TicketStatus::Used => Ok(()),
        TicketStatus::Refunded => Err(CoreError::TicketRefunded {
            ticket_id: ticket_id.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(price: Option<i64>) -> Event {
        Event {
            id: "evt-1".to_string(),
            organizer_id: "org".to_string(),
            title: "Night Market".to_string(),
            description: None,
            venue_id: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            ticket_price_cents: price,
            capacity: Some(2),
            qr_slug: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_qr_codes_are_unique_and_prefixed() {
        let a = new_ticket_qr_code();
        let b = new_ticket_qr_code();
        assert!(a.starts_with(TICKET_QR_PREFIX));
        assert_eq!(a.len(), TICKET_QR_PREFIX.len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_check_issuable() {
        assert!(check_issuable(&event(Some(2500)), 1).is_ok());
        assert!(matches!(
            check_issuable(&event(None), 1),
            Err(CoreError::TicketsNotOnSale { .. })
        ));
        assert!(matches!(
            check_issuable(&event(Some(0)), 1),
            Err(CoreError::TicketsNotOnSale { .. })
        ));
        assert!(matches!(
            check_issuable(&event(Some(2500)), 0),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_issuance_is_capped_per_request() {
        let mut uncapped = event(Some(1000));
        uncapped.capacity = None;

        assert!(check_issuable(&uncapped, MAX_TICKETS_PER_REQUEST).is_ok());
        assert!(matches!(
            check_issuable(&uncapped, MAX_TICKETS_PER_REQUEST + 1),
            Err(CoreError::Validation(ValidationError::OutOfRange { max: MAX_TICKETS_PER_REQUEST, .. }))
        ));
        assert!(matches!(
            check_issuable(&uncapped, i64::MAX / 2),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_fits_capacity() {
        assert!(fits_capacity(Some(2), 0, 2));
        assert!(!fits_capacity(Some(2), 2, 1));
        assert!(!fits_capacity(Some(2), 1, 2));
        assert!(fits_capacity(None, 1_000, 1_000));
    }

    #[test]
    fn test_state_machine() {
        assert!(check_redeemable("t", TicketStatus::Valid).is_ok());
        assert!(matches!(
            check_redeemable("t", TicketStatus::Used),
            Err(CoreError::TicketAlreadyUsed { .. })
        ));
        assert!(check_redeemable("t", TicketStatus::Refunded).is_err());

        assert!(check_refundable("t", TicketStatus::Valid).is_ok());
        assert!(check_refundable("t", TicketStatus::Used).is_ok());
        assert!(check_refundable("t", TicketStatus::Refunded).is_err());
    }
}
