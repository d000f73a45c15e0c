//! # Payment Gateway
//!
//! Opens payment intents with an external provider. Confirmation arrives
//! later through [`crate::services::settlement`].
//!
//! Every call is wrapped in [`open_intent_within`]: a slow provider fails the
//! checkout with `GATEWAY` instead of holding the caller indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use guild_core::Money;

/// Status of a freshly opened intent.
pub const INTENT_REQUIRES_PAYMENT_METHOD: &str = "requires_payment_method";

/// A payment intent as returned to the buyer's client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("Payment provider timed out after {0} ms")]
    Timeout(u128),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn open_intent(&self, amount: Money, currency: &str) -> Result<PaymentIntent, GatewayError>;
}

/// [`PaymentGateway::open_intent`] bounded by `timeout`.
pub async fn open_intent_within(
    gateway: &dyn PaymentGateway,
    amount: Money,
    currency: &str,
    timeout: Duration,
) -> Result<PaymentIntent, GatewayError> {
    match tokio::time::timeout(timeout, gateway.open_intent(amount, currency)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(timeout.as_millis())),
    }
}

/// In-process gateway that accepts every request.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn open_intent(&self, amount: Money, currency: &str) -> Result<PaymentIntent, GatewayError> {
        let id = format!("pi_{}", Uuid::new_v4());
        debug!(intent_id = %id, amount = amount.cents(), "Opened mock payment intent");

        Ok(PaymentIntent {
            client_secret: format!("{id}_secret"),
            id,
            amount_cents: amount.cents(),
            currency: currency.to_string(),
            status: INTENT_REQUIRES_PAYMENT_METHOD.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledGateway;

    #[async_trait]
    impl PaymentGateway for StalledGateway {
        async fn open_intent(&self, _: Money, _: &str) -> Result<PaymentIntent, GatewayError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(GatewayError::Unavailable("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_mock_intent_shape() {
        let intent = MockPaymentGateway
            .open_intent(Money::from_cents(1650), "usd")
            .await
            .unwrap();

        assert!(intent.id.starts_with("pi_"));
        assert_eq!(intent.client_secret, format!("{}_secret", intent.id));
        assert_eq!(intent.amount_cents, 1650);
        assert_eq!(intent.status, INTENT_REQUIRES_PAYMENT_METHOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_gateway_times_out() {
        let err = open_intent_within(
            &StalledGateway,
            Money::from_cents(100),
            "usd",
            Duration::from_millis(250),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout(250)));
    }
}
