//! # Order Repository
//!
//! Orders, their frozen line items, payouts, and settlement.
//!
//! ## Settlement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    settle(payment_intent_id)                            │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   1. UPDATE orders SET status='PAID'                                   │
//! │        WHERE payment_intent_id=? AND status='PENDING'                  │
//! │        │                                                                │
//! │        ├── 0 rows → someone else settled it (or it never was PENDING)  │
//! │        │           return stored order + payouts, write nothing        │
//! │        │                                                                │
//! │        └── 1 row  → this delivery owns the settlement                  │
//! │   2. load lines, artifacts, ACTIVE agreements                          │
//! │   3. plan_settlement() (guild-core)                                    │
//! │   4. check every supply increment against the counters just read      │
//! │        └── short → status='CANCELLED', COMMIT, return SoldOut         │
//! │   5. take supply (conditional UPDATE), write fees/total                │
//! │   6. INSERT payouts (QUEUED), INSERT receipt_outbox row                │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Step 1 is the first statement, so the write lock is taken before any  │
//! │  read and duplicate deliveries queue behind it. Competing orders for  │
//! │  the last units settle in commit order; the losers end CANCELLED      │
//! │  with no payouts and no receipt.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::artifact::ArtifactRepository;
use crate::repository::collab::CollabRepository;
use crate::repository::receipt::ReceiptOutboxRepository;
use guild_core::catalog::check_sale;
use guild_core::settlement::{plan_settlement, SettlementLine};
use guild_core::{CoreError, Money, Order, OrderItem, OrderStatus, Payout, PayoutStatus, Rate};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    buyer_id: String,
    subtotal_cents: i64,
    fees_cents: i64,
    total_cents: i64,
    payment_intent_id: Option<String>,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn with_items(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            items,
            subtotal_cents: self.subtotal_cents,
            fees_cents: self.fees_cents,
            total_cents: self.total_cents,
            payment_intent_id: self.payment_intent_id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    artifact_id: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            artifact_id: row.artifact_id,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PayoutRow {
    id: String,
    order_id: String,
    recipient_id: String,
    amount_cents: i64,
    status: PayoutStatus,
    created_at: DateTime<Utc>,
}

impl From<PayoutRow> for Payout {
    fn from(row: PayoutRow) -> Self {
        Payout {
            id: row.id,
            order_id: row.order_id,
            recipient_id: row.recipient_id,
            amount_cents: row.amount_cents,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Result of a settlement call.
#[derive(Debug, Clone)]
pub struct SettlementRecord {
    pub order: Order,
    pub payouts: Vec<Payout>,
    /// `false` when the order was already PAID and nothing was written.
    pub newly_settled: bool,
}

/// Repository for orders and payouts.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a PENDING order with its line items.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(
            id = %order.id,
            buyer = %order.buyer_id,
            items = order.items.len(),
            total = order.total_cents,
            "Inserting order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_id, subtotal_cents, fees_cents, total_cents,
                payment_intent_id, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer_id)
        .bind(order.subtotal_cents)
        .bind(order.fees_cents)
        .bind(order.total_cents)
        .bind(&order.payment_intent_id)
        .bind(order.status)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, artifact_id, quantity, unit_price_cents)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.artifact_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_where(&mut conn, "id", id).await
    }

    /// Gets the order opened for a payment intent.
    pub async fn get_by_payment_intent(&self, payment_intent_id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_where(&mut conn, "payment_intent_id", payment_intent_id).await
    }

    /// A buyer's orders, newest first.
    pub async fn list_for_buyer(&self, buyer_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM orders WHERE buyer_id = ?1 ORDER BY rowid DESC")
                .bind(buyer_id)
                .fetch_all(&mut *conn)
                .await?;

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = Self::fetch_where(&mut conn, "id", &id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Payouts recorded for an order, in settlement order.
    pub async fn payouts_for_order(&self, order_id: &str) -> DbResult<Vec<Payout>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_payouts(&mut conn, order_id).await
    }

    /// Settles the order opened for `payment_intent_id`, exactly once.
    ///
    /// ## Returns
    /// * `Ok(record)` with `newly_settled = true` - this call did the work
    /// * `Ok(record)` with `newly_settled = false` - already PAID, unchanged
    /// * `Err(DbError::NotFound)` - no order for this intent
    /// * `Err(DbError::Core(InvalidOrderStatus))` - order is CANCELLED/REFUNDED
    /// * `Err(DbError::Core(SoldOut))` - a limited artifact ran out first; the
    ///   order was cancelled in this call
    pub async fn settle(&self, payment_intent_id: &str, fee_rate: Rate) -> DbResult<SettlementRecord> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE orders SET status = 'PAID', updated_at = ?2
            WHERE payment_intent_id = ?1 AND status = 'PENDING'
            "#,
        )
        .bind(payment_intent_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut order = Self::fetch_where(&mut tx, "payment_intent_id", payment_intent_id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", payment_intent_id))?;

        if claimed == 0 {
            if order.status != OrderStatus::Paid {
                return Err(CoreError::InvalidOrderStatus {
                    order_id: order.id,
                    status: order.status.to_string(),
                }
                .into());
            }

            debug!(order_id = %order.id, "Order already settled");
            let payouts = Self::load_payouts(&mut tx, &order.id).await?;
            tx.rollback().await?;
            return Ok(SettlementRecord {
                order,
                payouts,
                newly_settled: false,
            });
        }

        // Join each line with its artifact and governing agreement
        let mut lines = Vec::with_capacity(order.items.len());
        let mut sold: HashMap<String, (i64, Option<i64>)> = HashMap::new();
        for item in &order.items {
            let Some(artifact) = ArtifactRepository::fetch_in(&mut tx, &item.artifact_id).await?
            else {
                warn!(
                    order_id = %order.id,
                    artifact_id = %item.artifact_id,
                    unit_price_cents = item.unit_price_cents,
                    quantity = item.quantity,
                    "Artifact no longer exists, line skipped at settlement"
                );
                continue;
            };
            let agreement = CollabRepository::active_for_artifact(&mut tx, &artifact.id).await?;
            sold.entry(artifact.id.clone())
                .or_insert((artifact.supply_sold, artifact.supply_limit));
            lines.push(SettlementLine::new(item, &artifact, agreement.as_ref())?);
        }

        let plan = plan_settlement(&lines, fee_rate);

        let shortfall: Result<(), CoreError> = plan.supply_increments.iter().try_for_each(|increment| {
            match sold.get_mut(&increment.artifact_id) {
                Some((sold_now, limit)) => {
                    *sold_now = check_sale(&increment.artifact_id, *sold_now, *limit, increment.quantity)?;
                    Ok(())
                }
                None => Ok(()),
            }
        });
        if let Err(err) = shortfall {
            Self::cancel_in(&mut tx, &order.id, now).await?;
            tx.commit().await?;
            warn!(
                order_id = %order.id,
                payment_intent_id = %payment_intent_id,
                error = %err,
                "Supply exhausted before settlement, order cancelled"
            );
            return Err(err.into());
        }

        for increment in &plan.supply_increments {
            let taken =
                ArtifactRepository::take_supply(&mut tx, &increment.artifact_id, increment.quantity).await?;
            if taken.is_none() {
                // Rolled back on drop; the order stays PENDING.
                return Err(CoreError::SoldOut {
                    artifact_id: increment.artifact_id.clone(),
                    remaining: 0,
                    requested: increment.quantity,
                }
                .into());
            }
        }

        let fees = plan.fees;
        let total = plan.order_total(Money::from_cents(order.subtotal_cents))?;

        sqlx::query(
            r#"
            UPDATE orders SET fees_cents = ?2, total_cents = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&order.id)
        .bind(fees.cents())
        .bind(total.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut payouts = Vec::with_capacity(plan.payouts.len());
        for allocation in plan.payouts {
            let payout = Payout {
                id: Uuid::new_v4().to_string(),
                order_id: order.id.clone(),
                recipient_id: allocation.recipient_id,
                amount_cents: allocation.amount_cents,
                status: PayoutStatus::Queued,
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO payouts (id, order_id, recipient_id, amount_cents, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&payout.id)
            .bind(&payout.order_id)
            .bind(&payout.recipient_id)
            .bind(payout.amount_cents)
            .bind(payout.status)
            .bind(payout.created_at)
            .execute(&mut *tx)
            .await?;

            payouts.push(payout);
        }

        ReceiptOutboxRepository::enqueue_in(&mut tx, &order.id).await?;

        tx.commit().await?;

        order.status = OrderStatus::Paid;
        order.fees_cents = fees.cents();
        order.total_cents = total.cents();
        order.updated_at = now;

        info!(
            order_id = %order.id,
            payment_intent_id = %payment_intent_id,
            fees = fees.cents(),
            total = total.cents(),
            payouts = payouts.len(),
            "Order settled"
        );

        Ok(SettlementRecord {
            order,
            payouts,
            newly_settled: true,
        })
    }

    async fn cancel_in(conn: &mut SqliteConnection, order_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE orders SET status = 'CANCELLED', updated_at = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn fetch_where(
        conn: &mut SqliteConnection,
        column: &'static str,
        value: &str,
    ) -> DbResult<Option<Order>> {
        let sql = format!(
            r#"
            SELECT id, buyer_id, subtotal_cents, fees_cents, total_cents,
                   payment_intent_id, status, created_at, updated_at
            FROM orders
            WHERE {column} = ?1
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(value)
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT artifact_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(row.with_items(items.into_iter().map(OrderItem::from).collect())))
    }

    async fn load_payouts(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<Payout>> {
        let rows = sqlx::query_as::<_, PayoutRow>(
            r#"
            SELECT id, order_id, recipient_id, amount_cents, status, created_at
            FROM payouts
            WHERE order_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Payout::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
