//! # Receipt Outbox Repository
//!
//! Queue of settlement receipts waiting for the notary.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OrderRepository::settle()                                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │  1. UPDATE orders SET status = 'PAID' ...                       │   │
//! │  │  2. INSERT payouts ...                                          │   │
//! │  │  3. INSERT INTO receipt_outbox (order_id) ← enqueue_in()        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReceiptDispatcher (guild-commerce, background task)                   │
//! │    1. get_pending(batch, max_attempts)                                 │
//! │    2. notary.notify(order_id)                                          │
//! │       a. ok    → mark_sent()                                           │
//! │       b. error → mark_failed(): attempts += 1, last_error = ?          │
//! │                                                                         │
//! │  A receipt is never lost (same transaction as the settlement) and a    │
//! │  failing notary never rolls a settlement back.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use guild_core::ReceiptOutboxEntry;

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: String,
    order_id: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for ReceiptOutboxEntry {
    fn from(row: OutboxRow) -> Self {
        ReceiptOutboxEntry {
            id: row.id,
            order_id: row.order_id,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            attempted_at: row.attempted_at,
            sent_at: row.sent_at,
        }
    }
}

/// Repository for receipt outbox operations.
#[derive(Debug, Clone)]
pub struct ReceiptOutboxRepository {
    pool: SqlitePool,
}

impl ReceiptOutboxRepository {
    /// Creates a new ReceiptOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptOutboxRepository { pool }
    }

    /// Queues a receipt for `order_id` inside the settlement transaction.
    pub async fn enqueue_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<()> {
        debug!(order_id = %order_id, "Queuing settlement receipt");

        sqlx::query(
            r#"
            INSERT INTO receipt_outbox (id, order_id, attempts, created_at)
            VALUES (?1, ?2, 0, ?3)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Unsent entries with fewer than `max_attempts` failures, oldest first.
    pub async fn get_pending(&self, limit: u32, max_attempts: u32) -> DbResult<Vec<ReceiptOutboxEntry>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, order_id, attempts, last_error, created_at, attempted_at, sent_at
            FROM receipt_outbox
            WHERE sent_at IS NULL AND attempts < ?2
            ORDER BY rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReceiptOutboxEntry::from).collect())
    }

    /// Unsent entries that have used up their attempts.
    pub async fn get_exhausted(&self, max_attempts: u32) -> DbResult<Vec<ReceiptOutboxEntry>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, order_id, attempts, last_error, created_at, attempted_at, sent_at
            FROM receipt_outbox
            WHERE sent_at IS NULL AND attempts >= ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(max_attempts)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ReceiptOutboxEntry::from).collect())
    }

    /// Gets the outbox entry of an order.
    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<ReceiptOutboxEntry>> {
        let row = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, order_id, attempts, last_error, created_at, attempted_at, sent_at
            FROM receipt_outbox
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ReceiptOutboxEntry::from))
    }

    /// Marks an entry as delivered.
    pub async fn mark_sent(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE receipt_outbox SET
                sent_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE receipt_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unsent entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM receipt_outbox WHERE sent_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use guild_core::{Order, OrderStatus};

    async fn db_with_order() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.orders()
            .insert(&Order {
                id: "ord-1".to_string(),
                buyer_id: "buyer".to_string(),
                items: vec![],
                subtotal_cents: 0,
                fees_cents: 0,
                total_cents: 0,
                payment_intent_id: None,
                status: OrderStatus::Paid,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        ReceiptOutboxRepository::enqueue_in(&mut conn, "ord-1").await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_failures_count_toward_max_attempts() {
        let db = db_with_order().await;
        let repo = db.receipt_outbox();

        let entry = repo.get_pending(10, 2).await.unwrap().remove(0);
        repo.mark_failed(&entry.id, "notary unreachable").await.unwrap();
        assert_eq!(repo.get_pending(10, 2).await.unwrap().len(), 1);

        repo.mark_failed(&entry.id, "notary unreachable").await.unwrap();
        assert!(repo.get_pending(10, 2).await.unwrap().is_empty());

        let exhausted = repo.get_exhausted(2).await.unwrap();
        assert_eq!(exhausted[0].attempts, 2);
        assert_eq!(exhausted[0].last_error.as_deref(), Some("notary unreachable"));
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_sent() {
        let db = db_with_order().await;
        let repo = db.receipt_outbox();

        let entry = repo.get_pending(10, 3).await.unwrap().remove(0);
        repo.mark_sent(&entry.id).await.unwrap();

        assert_eq!(repo.count_pending().await.unwrap(), 0);
        assert!(repo.get_by_order("ord-1").await.unwrap().unwrap().sent_at.is_some());
    }
}
