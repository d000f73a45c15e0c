//! # Checkout
//!
//! Turns a cart into a PENDING order with an open payment intent.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(caller, [ { artifactId, quantity }, ... ])               │
//! │                                                                         │
//! │  1. caller authenticated and of legal age                               │
//! │  2. per line:                                                           │
//! │       artifact exists and is visible      → else NOT_FOUND              │
//! │       priced                              → else BUSINESS_RULE          │
//! │       quantity ≥ 1                        → else VALIDATION             │
//! │       remaining supply ≥ quantity         → else BUSINESS_RULE          │
//! │       subtotal += unit price × quantity   (unit price frozen here)     │
//! │  3. estimated fee = round(fee% × subtotal)                              │
//! │  4. gateway.open_intent(subtotal + fee)   → GATEWAY on failure/timeout  │
//! │  5. persist Order (PENDING, intent id)                                  │
//! │                                                                         │
//! │  Supply is NOT touched here; payment is not guaranteed yet.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use guild_core::catalog::{can_view, check_purchasable};
use guild_core::{Money, Order, OrderItem, OrderStatus, Payout, ValidationError};

use super::{new_id, require, require_of_age};
use crate::error::{ApiError, ApiResult};
use crate::gateway::{open_intent_within, PaymentIntent};
use crate::identity::Principal;
use crate::Commerce;

fn default_quantity() -> i64 {
    1
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub artifact_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

impl CartLine {
    pub fn new(artifact_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            artifact_id: artifact_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub order: Order,
    pub payment_intent: PaymentIntent,
}

pub struct CheckoutService<'a> {
    ctx: &'a Commerce,
}

impl<'a> CheckoutService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        CheckoutService { ctx }
    }

    /// Creates a PENDING order and opens its payment intent.
    ///
    /// Nothing is persisted when any line fails or the gateway does.
    pub async fn create_order(&self, caller: Option<&Principal>, lines: &[CartLine]) -> ApiResult<CheckoutResult> {
        let principal = require_of_age(caller)?;

        if lines.is_empty() {
            return Err(ValidationError::required("items").into());
        }

        let artifacts = self.ctx.db().artifacts();
        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal = Money::zero();

        for line in lines {
            let artifact = match artifacts.get_by_id(&line.artifact_id).await? {
                Some(a) if can_view(&a, Some(&principal.user_id)) => a,
                _ => return Err(ApiError::not_found("Artifact", &line.artifact_id)),
            };

            let unit_price = check_purchasable(&artifact, line.quantity)?;
            subtotal = unit_price
                .multiply_quantity(line.quantity)
                .and_then(|gross| subtotal.checked_add(gross))
                .ok_or_else(|| ValidationError::amount_overflow("items"))?;

            items.push(OrderItem {
                artifact_id: artifact.id,
                quantity: line.quantity,
                unit_price_cents: unit_price.cents(),
            });
        }

        let config = self.ctx.config();
        let estimated_fee = subtotal.share(config.platform_fee);
        let total = subtotal
            .checked_add(estimated_fee)
            .ok_or_else(|| ValidationError::amount_overflow("items"))?;

        let intent = open_intent_within(
            self.ctx.gateway(),
            total,
            &config.currency,
            config.payment_intent_timeout,
        )
        .await?;

        let now = Utc::now();
        let order = Order {
            id: new_id(),
            buyer_id: principal.user_id.clone(),
            items,
            subtotal_cents: subtotal.cents(),
            fees_cents: estimated_fee.cents(),
            total_cents: total.cents(),
            payment_intent_id: Some(intent.id.clone()),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.ctx.db().orders().insert(&order).await?;

        info!(
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            lines = order.items.len(),
            subtotal = order.subtotal_cents,
            total = order.total_cents,
            intent_id = %intent.id,
            "Order created"
        );

        Ok(CheckoutResult {
            order,
            payment_intent: intent,
        })
    }

    /// An order, visible to its buyer only.
    pub async fn get_order(&self, caller: Option<&Principal>, order_id: &str) -> ApiResult<Order> {
        let principal = require(caller)?;

        match self.ctx.db().orders().get_by_id(order_id).await? {
            Some(order) if order.buyer_id == principal.user_id => Ok(order),
            Some(_) => Err(ApiError::permission("Forbidden")),
            None => Err(ApiError::not_found("Order", order_id)),
        }
    }

    /// The caller's orders, newest first.
    pub async fn list_orders(&self, caller: Option<&Principal>) -> ApiResult<Vec<Order>> {
        let principal = require(caller)?;
        Ok(self.ctx.db().orders().list_for_buyer(&principal.user_id).await?)
    }

    /// Payouts recorded for an order at settlement. Buyer only.
    pub async fn payouts(&self, caller: Option<&Principal>, order_id: &str) -> ApiResult<Vec<Payout>> {
        let order = self.get_order(caller, order_id).await?;
        Ok(self.ctx.db().orders().payouts_for_order(&order.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use guild_core::{ArtifactKind, SupplyClass};
    use guild_db::{Database, DbConfig};

    use super::*;
    use crate::config::CommerceConfig;
    use crate::dispatcher::ReceiptDispatcher;
    use crate::error::ErrorCode;
    use crate::gateway::{GatewayError, PaymentGateway};
    use crate::identity::JwtIdentityProvider;
    use crate::notary::LoggingNotary;
    use crate::services::NewArtifact;
    use crate::testing::{adult, harness, listed, minor, TEST_SECRET};

    struct StalledGateway;

    #[async_trait]
    impl PaymentGateway for StalledGateway {
        async fn open_intent(&self, _: Money, _: &str) -> Result<PaymentIntent, GatewayError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(GatewayError::Unavailable("stalled".into()))
        }
    }

    #[tokio::test]
    async fn test_order_is_pending_with_estimated_fee() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Limited, Some(10), 500).await;

        let result = h
            .commerce
            .checkout()
            .create_order(Some(&adult("buyer")), &[CartLine::new(&art.id, 3)])
            .await
            .unwrap();

        assert_eq!(result.order.status, OrderStatus::Pending);
        assert_eq!(result.order.subtotal_cents, 1500);
        assert_eq!(result.order.fees_cents, 150);
        assert_eq!(result.order.total_cents, 1650);
        assert_eq!(result.order.items[0].unit_price_cents, 500);
        assert_eq!(result.payment_intent.amount_cents, 1650);
        assert_eq!(
            result.order.payment_intent_id.as_deref(),
            Some(result.payment_intent.id.as_str())
        );

        // Supply only moves at settlement
        let stored = h.commerce.db().artifacts().get_by_id(&art.id).await.unwrap().unwrap();
        assert_eq!(stored.supply_sold, 0);
    }

    #[tokio::test]
    async fn test_buyer_must_be_signed_in_and_of_age() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 500).await;
        let lines = [CartLine::new(&art.id, 1)];
        let checkout = h.commerce.checkout();

        let err = checkout.create_order(None, &lines).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);

        let err = checkout.create_order(Some(&minor("kid")), &lines).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Permission);
    }

    #[tokio::test]
    async fn test_cart_line_failures() {
        let h = harness().await;
        let buyer = adult("buyer");
        let art = listed(&h.commerce, "owner", SupplyClass::Limited, Some(2), 500).await;
        let checkout = h.commerce.checkout();

        let err = checkout.create_order(Some(&buyer), &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = checkout
            .create_order(Some(&buyer), &[CartLine::new("missing", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = checkout
            .create_order(Some(&buyer), &[CartLine::new(&art.id, 0)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = checkout
            .create_order(Some(&buyer), &[CartLine::new(&art.id, 3)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        assert!(checkout.list_orders(Some(&buyer)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_amounts_past_i64_are_refused() {
        let h = harness().await;
        let buyer = adult("buyer");
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 500).await;
        let checkout = h.commerce.checkout();

        let err = checkout
            .create_order(Some(&buyer), &[CartLine::new(&art.id, i64::MAX / 100)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        // Each line is about i64::MAX / 2; the subtotal of three is not
        let lines = vec![CartLine::new(&art.id, i64::MAX / 1000); 3];
        let err = checkout.create_order(Some(&buyer), &lines).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        assert!(checkout.list_orders(Some(&buyer)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpriced_and_hidden_artifacts() {
        let h = harness().await;
        let owner = adult("owner");
        let buyer = adult("buyer");

        let unpriced = h
            .commerce
            .catalog()
            .create(
                Some(&owner),
                NewArtifact {
                    title: Some("Sketch".into()),
                    kind: Some(ArtifactKind::Image),
                    supply_class: Some(SupplyClass::Common),
                    visibility: Some(guild_core::Visibility::Public),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let private = h
            .commerce
            .catalog()
            .create(
                Some(&owner),
                NewArtifact {
                    title: Some("Draft".into()),
                    kind: Some(ArtifactKind::Text),
                    supply_class: Some(SupplyClass::Common),
                    price_cents: Some(100),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = h
            .commerce
            .checkout()
            .create_order(Some(&buyer), &[CartLine::new(&unpriced.id, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let err = h
            .commerce
            .checkout()
            .create_order(Some(&buyer), &[CartLine::new(&private.id, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_gateway_timeout_leaves_no_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = CommerceConfig::new(TEST_SECRET).payment_intent_timeout(Duration::from_millis(50));
        let (_dispatcher, receipts) = ReceiptDispatcher::new(db.clone(), Arc::new(LoggingNotary), &config);
        let commerce = Commerce::new(
            db,
            config,
            Arc::new(JwtIdentityProvider::new(TEST_SECRET)),
            Arc::new(StalledGateway),
            receipts,
        );
        let art = listed(&commerce, "owner", SupplyClass::Common, None, 500).await;
        let buyer = adult("buyer");

        let err = commerce
            .checkout()
            .create_order(Some(&buyer), &[CartLine::new(&art.id, 1)])
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::Gateway);
        assert!(commerce.checkout().list_orders(Some(&buyer)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_are_private_to_the_buyer() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 500).await;
        let buyer = adult("buyer");
        let checkout = h.commerce.checkout();

        let created = checkout
            .create_order(Some(&buyer), &[CartLine::new(&art.id, 1)])
            .await
            .unwrap();

        let order = checkout.get_order(Some(&buyer), &created.order.id).await.unwrap();
        assert_eq!(order.id, created.order.id);
        assert_eq!(order.items, created.order.items);
        assert_eq!(order.total_cents, created.order.total_cents);

        let err = checkout
            .get_order(Some(&adult("snoop")), &created.order.id)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Permission);

        let err = checkout.get_order(Some(&buyer), "nope").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        assert!(checkout.payouts(Some(&buyer), &order.id).await.unwrap().is_empty());
    }
}
