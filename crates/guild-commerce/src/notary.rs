//! Settlement receipt notary contract.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotaryError {
    #[error("Notary rejected receipt: {0}")]
    Rejected(String),

    #[error("Notary unavailable: {0}")]
    Unavailable(String),
}

/// Records that an order settled. Delivery is best effort.
#[async_trait]
pub trait ReceiptNotary: Send + Sync {
    async fn notify(&self, order_id: &str) -> Result<(), NotaryError>;
}

/// Notary that only logs.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotary;

#[async_trait]
impl ReceiptNotary for LoggingNotary {
    async fn notify(&self, order_id: &str) -> Result<(), NotaryError> {
        info!(order_id = %order_id, "Settlement receipt recorded");
        Ok(())
    }
}
