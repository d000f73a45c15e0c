//! # Event Repository
//!
//! Events, tickets, and the live-ticket counter that bounds capacity.
//!
//! ## Ticket State Machine
//! ```text
//!            issue_tickets()
//!                 │
//!                 ▼
//!   ┌────────► VALID ──── redeem_ticket() ────► USED
//!   │            │                               │
//!   │            └──── refund_ticket() ──┐       │ refund_ticket()
//!   │                                    ▼       ▼
//!   │                                   REFUNDED ◄┘
//!   │                                       │
//!   └──── tickets_live - 1 ◄────────────────┘
//! ```
//!
//! `events.tickets_live` counts VALID + USED tickets. Issuance reserves
//! against it with one conditional UPDATE; refunds give the unit back.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::qr::QrRepository;
use guild_core::ticketing::{check_redeemable, check_refundable, check_ticket_batch, new_ticket_qr_code};
use guild_core::{CoreError, Event, QrEntityType, Ticket, TicketStatus};

const EVENT_COLUMNS: &str = r#"
    id, organizer_id, title, description, venue_id, start_time, end_time,
    ticket_price_cents, capacity, qr_slug, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: String,
    organizer_id: String,
    title: String,
    description: Option<String>,
    venue_id: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    ticket_price_cents: Option<i64>,
    capacity: Option<i64>,
    qr_slug: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            organizer_id: row.organizer_id,
            title: row.title,
            description: row.description,
            venue_id: row.venue_id,
            start_time: row.start_time,
            end_time: row.end_time,
            ticket_price_cents: row.ticket_price_cents,
            capacity: row.capacity,
            qr_slug: row.qr_slug,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: String,
    event_id: String,
    buyer_id: String,
    status: TicketStatus,
    qr_code: String,
    created_at: DateTime<Utc>,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Ticket {
            id: row.id,
            event_id: row.event_id,
            buyer_id: row.buyer_id,
            status: row.status,
            qr_code: row.qr_code,
            created_at: row.created_at,
        }
    }
}

/// Repository for events and tickets.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    /// Creates a new EventRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EventRepository { pool }
    }

    /// Inserts an event, claiming its QR slug in the same transaction.
    pub async fn insert(&self, event: &Event) -> DbResult<()> {
        debug!(id = %event.id, organizer = %event.organizer_id, "Inserting event");

        let mut tx = self.pool.begin().await?;

        if let Some(slug) = &event.qr_slug {
            QrRepository::register(&mut tx, slug, QrEntityType::Event, &event.id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO events (
                id, organizer_id, title, description, venue_id, start_time, end_time,
                ticket_price_cents, capacity, tickets_live, qr_slug, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?12)
            "#,
        )
        .bind(&event.id)
        .bind(&event.organizer_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.venue_id)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.ticket_price_cents)
        .bind(event.capacity)
        .bind(&event.qr_slug)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets an event by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");

        let row = sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Event::from))
    }

    /// Lists events, optionally for one organizer, by start time.
    pub async fn list(&self, organizer_id: Option<&str>) -> DbResult<Vec<Event>> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE (?1 IS NULL OR organizer_id = ?1)
            ORDER BY start_time ASC, rowid ASC
            "#
        );

        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(organizer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    /// Non-refunded tickets outstanding for an event.
    pub async fn live_ticket_count(&self, event_id: &str) -> DbResult<i64> {
        let live: Option<i64> = sqlx::query_scalar("SELECT tickets_live FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        live.ok_or_else(|| DbError::not_found("Event", event_id))
    }

    /// All tickets of an event in issue order.
    pub async fn tickets_for_event(&self, event_id: &str) -> DbResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, event_id, buyer_id, status, qr_code, created_at
            FROM tickets
            WHERE event_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Ticket::from).collect())
    }

    /// Reserves `quantity` units of capacity and issues that many VALID tickets.
    ///
    /// `quantity` outside `1..=MAX_TICKETS_PER_REQUEST` is refused before
    /// anything is written.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(EventSoldOut))` - not enough capacity left
    /// * `Err(DbError::NotFound)` - no such event
    pub async fn issue_tickets(
        &self,
        event_id: &str,
        buyer_id: &str,
        quantity: i64,
    ) -> DbResult<Vec<Ticket>> {
        check_ticket_batch(quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let reserved = sqlx::query(
            r#"
            UPDATE events SET
                tickets_live = tickets_live + ?2,
                updated_at = ?3
            WHERE id = ?1
              AND (capacity IS NULL OR tickets_live + ?2 <= capacity)
            "#,
        )
        .bind(event_id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if reserved == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM events WHERE id = ?1")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;

            return match exists {
                Some(_) => Err(CoreError::EventSoldOut {
                    event_id: event_id.to_string(),
                }
                .into()),
                None => Err(DbError::not_found("Event", event_id)),
            };
        }

        let mut tickets = Vec::new();
        for _ in 0..quantity {
            let ticket = Ticket {
                id: Uuid::new_v4().to_string(),
                event_id: event_id.to_string(),
                buyer_id: buyer_id.to_string(),
                status: TicketStatus::Valid,
                qr_code: new_ticket_qr_code(),
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO tickets (id, event_id, buyer_id, status, qr_code, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&ticket.id)
            .bind(&ticket.event_id)
            .bind(&ticket.buyer_id)
            .bind(ticket.status)
            .bind(&ticket.qr_code)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await?;

            tickets.push(ticket);
        }

        tx.commit().await?;

        info!(event_id = %event_id, buyer = %buyer_id, quantity, "Tickets issued");
        Ok(tickets)
    }

    /// Looks up a ticket by event and QR payload.
    pub async fn find_ticket_by_qr(&self, event_id: &str, qr_code: &str) -> DbResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, event_id, buyer_id, status, qr_code, created_at
            FROM tickets
            WHERE event_id = ?1 AND qr_code = ?2
            "#,
        )
        .bind(event_id)
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Ticket::from))
    }

    /// VALID → USED, once.
    ///
    /// ## Returns
    /// * `Err(DbError::Core(TicketAlreadyUsed))` - already scanned
    /// * `Err(DbError::Core(TicketRefunded))` - refunded tickets don't scan
    pub async fn redeem_ticket(&self, ticket_id: &str) -> DbResult<Ticket> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            UPDATE tickets SET status = 'USED'
            WHERE id = ?1 AND status = 'VALID'
            RETURNING id, event_id, buyer_id, status, qr_code, created_at
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            info!(ticket_id = %ticket_id, event_id = %row.event_id, "Ticket redeemed");
            return Ok(row.into());
        }

        let mut conn = self.pool.acquire().await?;
        let current = Self::fetch_ticket(&mut conn, ticket_id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", ticket_id))?;
        check_redeemable(&current.id, current.status)?;

        Err(DbError::Internal(format!(
            "ticket {ticket_id} was VALID but could not be redeemed"
        )))
    }

    /// VALID | USED → REFUNDED, giving one unit of capacity back.
    pub async fn refund_ticket(&self, ticket_id: &str) -> DbResult<Ticket> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            UPDATE tickets SET status = 'REFUNDED'
            WHERE id = ?1 AND status IN ('VALID', 'USED')
            RETURNING id, event_id, buyer_id, status, qr_code, created_at
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let current = Self::fetch_ticket(&mut tx, ticket_id)
                .await?
                .ok_or_else(|| DbError::not_found("Ticket", ticket_id))?;
            check_refundable(&current.id, current.status)?;
            return Err(DbError::Internal(format!(
                "ticket {ticket_id} is refundable but was not refunded"
            )));
        };

        sqlx::query(
            r#"
            UPDATE events SET tickets_live = tickets_live - 1, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(&row.event_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(ticket_id = %ticket_id, event_id = %row.event_id, "Ticket refunded");
        Ok(row.into())
    }

    /// Gets a ticket by ID.
    pub async fn get_ticket(&self, ticket_id: &str) -> DbResult<Option<Ticket>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_ticket(&mut conn, ticket_id).await
    }

    async fn fetch_ticket(conn: &mut SqliteConnection, ticket_id: &str) -> DbResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, event_id, buyer_id, status, qr_code, created_at
            FROM tickets
            WHERE id = ?1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Ticket::from))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use guild_core::ticketing::MAX_TICKETS_PER_REQUEST;
    use guild_core::ValidationError;

    fn event(id: &str, capacity: Option<i64>) -> Event {
        let start = Utc::now() + Duration::days(7);
        Event {
            id: id.to_string(),
            organizer_id: "org".to_string(),
            title: "Night Market".to_string(),
            description: None,
            venue_id: None,
            start_time: start,
            end_time: start + Duration::hours(4),
            ticket_price_cents: Some(2500),
            capacity,
            qr_slug: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_capacity_is_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.events();
        repo.insert(&event("evt-1", Some(2))).await.unwrap();

        let issued = repo.issue_tickets("evt-1", "fan", 2).await.unwrap();
        assert_eq!(issued.len(), 2);
        assert_ne!(issued[0].qr_code, issued[1].qr_code);

        let err = repo.issue_tickets("evt-1", "fan", 1).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::EventSoldOut { .. })));
        assert_eq!(err.to_string(), "Event is sold out");
        assert_eq!(repo.tickets_for_event("evt-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unbounded_event() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.events();
        repo.insert(&event("evt-1", None)).await.unwrap();

        repo.issue_tickets("evt-1", "fan", 50).await.unwrap();
        assert_eq!(repo.live_ticket_count("evt-1").await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_oversized_batch_writes_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.events();
        repo.insert(&event("evt-1", None)).await.unwrap();

        for quantity in [0, MAX_TICKETS_PER_REQUEST + 1, i64::MAX / 2] {
            let err = repo.issue_tickets("evt-1", "fan", quantity).await.unwrap_err();
            assert!(matches!(
                err,
                DbError::Core(CoreError::Validation(ValidationError::OutOfRange { .. }))
            ));
        }
        assert_eq!(repo.live_ticket_count("evt-1").await.unwrap(), 0);
        assert!(repo.tickets_for_event("evt-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.events().issue_tickets("nope", "fan", 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_redeem_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.events();
        repo.insert(&event("evt-1", Some(1))).await.unwrap();
        let ticket = repo.issue_tickets("evt-1", "fan", 1).await.unwrap().remove(0);

        let found = repo.find_ticket_by_qr("evt-1", &ticket.qr_code).await.unwrap().unwrap();
        let used = repo.redeem_ticket(&found.id).await.unwrap();
        assert_eq!(used.status, TicketStatus::Used);

        let err = repo.redeem_ticket(&found.id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::TicketAlreadyUsed { .. })));
    }

    #[tokio::test]
    async fn test_refund_frees_capacity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.events();
        repo.insert(&event("evt-1", Some(1))).await.unwrap();
        let ticket = repo.issue_tickets("evt-1", "fan", 1).await.unwrap().remove(0);

        repo.redeem_ticket(&ticket.id).await.unwrap();
        let refunded = repo.refund_ticket(&ticket.id).await.unwrap();
        assert_eq!(refunded.status, TicketStatus::Refunded);
        assert_eq!(repo.live_ticket_count("evt-1").await.unwrap(), 0);

        assert!(matches!(
            repo.refund_ticket(&ticket.id).await.unwrap_err(),
            DbError::Core(CoreError::TicketRefunded { .. })
        ));
        assert!(matches!(
            repo.redeem_ticket(&ticket.id).await.unwrap_err(),
            DbError::Core(CoreError::TicketRefunded { .. })
        ));

        repo.issue_tickets("evt-1", "fan", 1).await.unwrap();
    }
}
