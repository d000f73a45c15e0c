//! # Receipt Dispatcher
//!
//! Drains the receipt outbox and hands each settled order to the notary.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Receipt Dispatcher Flow                              │
//! │                                                                         │
//! │  settlement ──nudge()──┐     (try_send, never awaited)                  │
//! │                        ▼                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ReceiptDispatcher::run                                         │   │
//! │  │                                                                 │   │
//! │  │  select! {                                                      │   │
//! │  │    interval.tick() ─┐                                           │   │
//! │  │    nudge_rx.recv() ─┼──► dispatch_pending()                     │   │
//! │  │    shutdown_rx     ─┴──► break                                  │   │
//! │  │  }                                                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  dispatch_pending():                                                    │
//! │    1. get_pending(batch_size, max_attempts)                            │
//! │    2. timeout(receipt_timeout, notary.notify(order_id))                │
//! │       ok            → mark_sent                                        │
//! │       error/timeout → mark_failed (attempts + 1), warn!                │
//! │    3. entries that reach max_attempts are no longer picked up          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use guild_db::{Database, DbResult};

use crate::config::CommerceConfig;
use crate::notary::ReceiptNotary;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Background task delivering settlement receipts.
pub struct ReceiptDispatcher {
    db: Database,
    notary: Arc<dyn ReceiptNotary>,
    timeout: Duration,
    poll_interval: Duration,
    max_attempts: u32,
    batch_size: u32,
    nudge_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for waking and stopping the dispatcher.
#[derive(Debug, Clone)]
pub struct ReceiptDispatcherHandle {
    nudge_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ReceiptDispatcherHandle {
    /// Asks for a dispatch pass without waiting.
    ///
    /// A full channel already holds a pending wake-up, so the extra one is dropped.
    pub fn nudge(&self) {
        if let Err(mpsc::error::TrySendError::Closed(_)) = self.nudge_tx.try_send(()) {
            debug!("Receipt dispatcher is not running; receipt stays queued");
        }
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Receipt dispatcher already stopped");
        }
    }
}

impl ReceiptDispatcher {
    /// Creates a new dispatcher and returns a handle.
    pub fn new(
        db: Database,
        notary: Arc<dyn ReceiptNotary>,
        config: &CommerceConfig,
    ) -> (Self, ReceiptDispatcherHandle) {
        let (nudge_tx, nudge_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = ReceiptDispatcher {
            db,
            notary,
            timeout: config.receipt_timeout,
            poll_interval: config.receipt_poll_interval,
            max_attempts: config.receipt_max_attempts,
            batch_size: config.receipt_batch_size,
            nudge_rx,
            shutdown_rx,
        };

        let handle = ReceiptDispatcherHandle {
            nudge_tx,
            shutdown_tx,
        };

        (dispatcher, handle)
    }

    /// Runs the dispatch loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Receipt dispatcher starting");
        self.report_exhausted().await;

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.pass().await,

                Some(()) = self.nudge_rx.recv() => self.pass().await,

                _ = self.shutdown_rx.recv() => {
                    info!("Receipt dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Receipt dispatcher stopped");
    }

    async fn pass(&self) {
        if let Err(e) = self.dispatch_pending().await {
            error!(?e, "Failed to dispatch receipts");
        }
    }

    /// Delivers one batch of pending receipts.
    pub async fn dispatch_pending(&self) -> DbResult<DispatchReport> {
        let outbox = self.db.receipt_outbox();
        let entries = outbox.get_pending(self.batch_size, self.max_attempts).await?;

        if entries.is_empty() {
            return Ok(DispatchReport::default());
        }

        debug!(count = entries.len(), "Dispatching receipts");
        let mut report = DispatchReport::default();

        for entry in entries {
            let failure = match tokio::time::timeout(self.timeout, self.notary.notify(&entry.order_id)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("Notary timed out after {} ms", self.timeout.as_millis())),
            };

            match failure {
                None => {
                    outbox.mark_sent(&entry.id).await?;
                    report.sent += 1;
                }
                Some(reason) => {
                    outbox.mark_failed(&entry.id, &reason).await?;
                    report.failed += 1;

                    let attempts = entry.attempts + 1;
                    if attempts >= i64::from(self.max_attempts) {
                        warn!(
                            order_id = %entry.order_id,
                            attempts,
                            error = %reason,
                            "Giving up on settlement receipt"
                        );
                    } else {
                        warn!(
                            order_id = %entry.order_id,
                            attempts,
                            error = %reason,
                            "Settlement receipt failed"
                        );
                    }
                }
            }
        }

        Ok(report)
    }

    async fn report_exhausted(&self) {
        match self.db.receipt_outbox().get_exhausted(self.max_attempts).await {
            Ok(entries) => {
                for entry in entries {
                    warn!(
                        order_id = %entry.order_id,
                        attempts = entry.attempts,
                        last_error = ?entry.last_error,
                        "Skipping receipt that exceeded max attempts"
                    );
                }
            }
            Err(e) => error!(?e, "Failed to read exhausted receipts"),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use guild_core::SupplyClass;
    use guild_db::DbConfig;

    use super::*;
    use crate::notary::NotaryError;
    use crate::services::{CartLine, PaymentConfirmation};
    use crate::testing::{adult, harness, harness_with, listed, Harness, TEST_SECRET};
    use crate::Commerce;

    struct SlowNotary;

    #[async_trait]
    impl ReceiptNotary for SlowNotary {
        async fn notify(&self, _: &str) -> Result<(), NotaryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    /// Checks out and settles one order, returning its id.
    async fn settle_one(commerce: &Commerce) -> String {
        let art = listed(commerce, "owner", SupplyClass::Common, None, 1000).await;
        let checkout = commerce
            .checkout()
            .create_order(Some(&adult("buyer")), &[CartLine::new(&art.id, 1)])
            .await
            .unwrap();
        commerce
            .settlement()
            .handle_confirmation(&PaymentConfirmation::succeeded(&checkout.payment_intent.id))
            .await
            .unwrap();
        checkout.order.id
    }

    #[tokio::test]
    async fn test_pending_receipts_are_delivered_once() {
        let h = harness().await;
        let order_id = settle_one(&h.commerce).await;

        let report = h.dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report, DispatchReport { sent: 1, failed: 0 });
        assert_eq!(h.notary.delivered(), vec![order_id.clone()]);

        let report = h.dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report, DispatchReport::default());

        let entry = h.commerce.db().receipt_outbox().get_by_order(&order_id).await.unwrap().unwrap();
        assert!(entry.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_failures_count_until_exhausted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let h = harness_with(db, CommerceConfig::new(TEST_SECRET).receipt_max_attempts(2));
        let order_id = settle_one(&h.commerce).await;
        h.notary.set_failing(true);

        for attempt in 1..=2 {
            let report = h.dispatcher.dispatch_pending().await.unwrap();
            assert_eq!(report, DispatchReport { sent: 0, failed: 1 });

            let entry = h.commerce.db().receipt_outbox().get_by_order(&order_id).await.unwrap().unwrap();
            assert_eq!(entry.attempts, attempt);
            assert!(entry.last_error.is_some());
        }

        // Exhausted entries are skipped even once the notary recovers
        h.notary.set_failing(false);
        let report = h.dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report, DispatchReport::default());
        assert!(h.notary.delivered().is_empty());

        // The settlement itself is untouched
        let order = h.commerce.db().orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status, guild_core::OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_slow_notary_times_out() {
        let h = harness().await;
        let order_id = settle_one(&h.commerce).await;

        let config = CommerceConfig::new(TEST_SECRET).receipt_timeout(Duration::from_millis(50));
        let (dispatcher, _handle) = ReceiptDispatcher::new(h.commerce.db().clone(), Arc::new(SlowNotary), &config);

        let report = dispatcher.dispatch_pending().await.unwrap();
        assert_eq!(report.failed, 1);

        let entry = h.commerce.db().receipt_outbox().get_by_order(&order_id).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);
        assert!(entry.last_error.unwrap_or_default().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_loop_delivers_on_nudge_and_stops() {
        let Harness {
            commerce,
            dispatcher,
            notary,
        } = harness().await;
        let task = tokio::spawn(dispatcher.run());

        let order_id = settle_one(&commerce).await;

        let delivered = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if !notary.delivered().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(delivered.is_ok());
        assert_eq!(notary.delivered(), vec![order_id]);

        commerce.receipts().shutdown().await;
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
