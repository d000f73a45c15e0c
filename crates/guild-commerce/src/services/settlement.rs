//! # Payment Settlement
//!
//! Handles payment confirmations delivered by the gateway.
//!
//! ```text
//! { "type": "payment_intent.succeeded", "data": { "object": { "id": "pi_..." } } }
//!        │
//!        ├── other type       → Ignored { received: true }
//!        ├── missing id       → VALIDATION
//!        ├── unknown intent   → NOT_FOUND
//!        └── OrderRepository::settle (one transaction, exactly once)
//!               │
//!               ├── newly settled → nudge the receipt dispatcher
//!               ├── replay        → stored order + payouts, unchanged
//!               └── supply gone   → order CANCELLED, BUSINESS_RULE
//! ```
//!
//! Deliveries are safe to repeat: the PENDING → PAID transition is the first
//! statement of the settlement transaction, so at most one delivery computes
//! payouts or moves supply.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use guild_core::{Order, Payout, ValidationError};

use crate::error::ApiResult;
use crate::Commerce;

/// The one confirmation type that settles an order.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// A gateway confirmation payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<ConfirmationData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmationData {
    #[serde(default)]
    pub object: Option<ConfirmationObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmationObject {
    #[serde(default)]
    pub id: Option<String>,
}

impl PaymentConfirmation {
    /// A success confirmation for `payment_intent_id`.
    pub fn succeeded(payment_intent_id: impl Into<String>) -> Self {
        PaymentConfirmation {
            event_type: PAYMENT_SUCCEEDED.to_string(),
            data: Some(ConfirmationData {
                object: Some(ConfirmationObject {
                    id: Some(payment_intent_id.into()),
                }),
            }),
        }
    }

    /// The referenced intent id, if present and non-empty.
    pub fn payment_intent_id(&self) -> Option<&str> {
        self.data
            .as_ref()?
            .object
            .as_ref()?
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// What the gateway gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfirmationOutcome {
    /// Non-success event types are acknowledged so the gateway stops retrying.
    Ignored { received: bool },
    Settled { order: Order, payouts: Vec<Payout> },
}

pub struct SettlementService<'a> {
    ctx: &'a Commerce,
}

impl<'a> SettlementService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        SettlementService { ctx }
    }

    /// Settles the order behind a success confirmation.
    pub async fn handle_confirmation(&self, confirmation: &PaymentConfirmation) -> ApiResult<ConfirmationOutcome> {
        if confirmation.event_type != PAYMENT_SUCCEEDED {
            debug!(event_type = %confirmation.event_type, "Ignoring payment event");
            return Ok(ConfirmationOutcome::Ignored { received: true });
        }

        let intent_id = confirmation
            .payment_intent_id()
            .ok_or_else(|| ValidationError::required("data.object.id"))?;

        let record = self
            .ctx
            .db()
            .orders()
            .settle(intent_id, self.ctx.config().platform_fee)
            .await?;

        if record.newly_settled {
            self.ctx.receipts().nudge();
        } else {
            info!(
                order_id = %record.order.id,
                payment_intent_id = %intent_id,
                "Duplicate payment confirmation, order already settled"
            );
        }

        Ok(ConfirmationOutcome::Settled {
            order: record.order,
            payouts: record.payouts,
        })
    }
}
