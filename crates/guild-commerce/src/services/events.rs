//! # Events & Ticketing
//!
//! ## Ticket Lifecycle
//! ```text
//! issue_tickets ──► VALID ──scan_ticket──► USED
//!                     │                     │
//!                     └────refund_ticket────┴──► REFUNDED
//! ```
//!
//! Capacity is reserved by a conditional update on the event's live-ticket
//! counter, so concurrent buyers can never push an event past capacity.
//! A refund gives its unit back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use guild_core::ticketing::check_issuable;
use guild_core::validation::{validate_price_cents, validate_slug, validate_time_window, validate_title};
use guild_core::{Event, Ticket, ValidationError};

use super::{new_id, require, require_of_age};
use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;
use crate::Commerce;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub venue_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub ticket_price_cents: Option<i64>,
    pub capacity: Option<i64>,
    pub qr_slug: Option<String>,
}

/// An event together with its tickets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event: Event,
    pub tickets: Vec<Ticket>,
}

pub struct EventService<'a> {
    ctx: &'a Commerce,
}

impl<'a> EventService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        EventService { ctx }
    }

    /// Creates an event organized by the caller.
    pub async fn create(&self, caller: Option<&Principal>, input: NewEvent) -> ApiResult<Event> {
        let principal = require(caller)?;

        let title = input.title.ok_or_else(|| ValidationError::required("title"))?;
        let start_time = input
            .start_time
            .ok_or_else(|| ValidationError::required("startTime"))?;
        let end_time = input
            .end_time
            .ok_or_else(|| ValidationError::required("endTime"))?;

        validate_title("title", &title)?;
        validate_time_window(start_time, end_time)?;
        if let Some(price) = input.ticket_price_cents {
            validate_price_cents("ticketPriceCents", price)?;
        }
        if let Some(capacity) = input.capacity {
            if capacity < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "capacity".to_string(),
                    min: 0,
                    max: i64::MAX,
                }
                .into());
            }
        }
        if let Some(slug) = &input.qr_slug {
            validate_slug(slug)?;
        }
        if let Some(venue_id) = &input.venue_id {
            if self.ctx.db().venues().get_by_id(venue_id).await?.is_none() {
                return Err(ApiError::not_found("Venue", venue_id));
            }
        }

        let now = Utc::now();
        let event = Event {
            id: new_id(),
            organizer_id: principal.user_id.clone(),
            title: title.trim().to_string(),
            description: input.description,
            venue_id: input.venue_id,
            start_time,
            end_time,
            ticket_price_cents: input.ticket_price_cents,
            capacity: input.capacity,
            qr_slug: input.qr_slug,
            created_at: now,
            updated_at: now,
        };

        self.ctx.db().events().insert(&event).await?;

        info!(
            event_id = %event.id,
            organizer_id = %event.organizer_id,
            capacity = ?event.capacity,
            qr_slug = ?event.qr_slug,
            "Event created"
        );

        Ok(event)
    }

    /// Events, optionally only those of one organizer.
    pub async fn list(&self, organizer_id: Option<&str>) -> ApiResult<Vec<Event>> {
        Ok(self.ctx.db().events().list(organizer_id).await?)
    }

    pub async fn get(&self, event_id: &str) -> ApiResult<EventDetail> {
        let event = self.load(event_id).await?;
        let tickets = self.ctx.db().events().tickets_for_event(&event.id).await?;
        Ok(EventDetail { event, tickets })
    }

    /// Issues `quantity` (default 1) VALID tickets to the caller.
    ///
    /// ## Checks (in order)
    /// 1. authenticated and of legal age
    /// 2. event exists
    /// 3. ticket price set → else BUSINESS_RULE (not on sale)
    /// 4. 1 ≤ quantity ≤ `MAX_TICKETS_PER_REQUEST` → else VALIDATION
    /// 5. capacity reservation → else BUSINESS_RULE ("Event is sold out")
    pub async fn issue_tickets(
        &self,
        caller: Option<&Principal>,
        event_id: &str,
        quantity: Option<i64>,
    ) -> ApiResult<Vec<Ticket>> {
        let principal = require_of_age(caller)?;
        let quantity = quantity.unwrap_or(1);

        let event = self.load(event_id).await?;
        check_issuable(&event, quantity)?;

        Ok(self
            .ctx
            .db()
            .events()
            .issue_tickets(&event.id, &principal.user_id, quantity)
            .await?)
    }

    /// Redeems the ticket carrying `qr_code` at the door.
    pub async fn scan_ticket(&self, event_id: &str, qr_code: &str) -> ApiResult<Ticket> {
        let event = self.load(event_id).await?;

        if qr_code.trim().is_empty() {
            return Err(ValidationError::required("qrCode").into());
        }

        let ticket = self
            .ctx
            .db()
            .events()
            .find_ticket_by_qr(&event.id, qr_code)
            .await?
            .ok_or_else(|| ApiError::not_found("Ticket", qr_code))?;

        Ok(self.ctx.db().events().redeem_ticket(&ticket.id).await?)
    }

    /// Refunds a ticket and frees its capacity. Organizer only.
    pub async fn refund_ticket(&self, caller: Option<&Principal>, ticket_id: &str) -> ApiResult<Ticket> {
        let principal = require(caller)?;

        let ticket = self
            .ctx
            .db()
            .events()
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Ticket", ticket_id))?;

        let event = self.load(&ticket.event_id).await?;
        if event.organizer_id != principal.user_id {
            return Err(ApiError::permission("Only the organizer can refund tickets"));
        }

        Ok(self.ctx.db().events().refund_ticket(&ticket.id).await?)
    }

    async fn load(&self, event_id: &str) -> ApiResult<Event> {
        self.ctx
            .db()
            .events()
            .get_by_id(event_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Event", event_id))
    }
}
