//! # Connection Pool
//!
//! One SQLite file shared by every service. Reads and writes come from
//! independent callers: buyers checking out, the payment provider redelivering
//! confirmations, door staff scanning tickets, the receipt dispatcher.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout ─┐                                                            │
//! │  webhook  ─┼──► SqlitePool (max_connections) ──► guild.db (WAL)         │
//! │  scanner  ─┤                                                            │
//! │  receipts ─┘                                                            │
//! │                                                                         │
//! │  Readers never block on the writer (WAL).                               │
//! │  Writers queue on SQLite's single write lock for up to busy_timeout.    │
//! │  Every guarded counter is one conditional UPDATE inside the writer's    │
//! │  transaction, so queueing is the only coordination needed.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::artifact::ArtifactRepository;
use crate::repository::collab::CollabRepository;
use crate::repository::event::EventRepository;
use crate::repository::order::OrderRepository;
use crate::repository::qr::QrRepository;
use crate::repository::receipt::ReceiptOutboxRepository;
use crate::repository::review::ReviewRepository;
use crate::repository::venue::VenueRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the commerce database.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/guild/guild.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for a private database.
    pub database_path: PathBuf,

    /// Pool size. Default 5.
    pub max_connections: u32,

    /// How long a caller waits for a free connection. Default 30s.
    pub acquire_timeout: Duration,

    /// How long a writer waits on the write lock before failing. Default 5s.
    pub busy_timeout: Duration,

    /// Apply embedded migrations on open. Default true.
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A private in-memory database.
    ///
    /// Limited to one connection: each SQLite connection to `:memory:` would
    /// otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(IN_MEMORY)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }

    /// Per-connection settings: WAL, foreign keys on, busy timeout.
    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = if self.is_in_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.database_path.display())
        };

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        Ok(options)
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the commerce database.
///
/// Clones share one pool. Repositories are built per call and carry their
/// own pool handle, so a service can hold several at once.
///
/// ```rust,ignore
/// let order = db.orders().get_by_payment_intent("pi_123").await?;
/// let tickets = db.events().tickets_for_event(&event.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            max_connections = config.max_connections,
            "Opening commerce database"
        );

        let options = config.connect_options()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!("Pool connected");

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for transactions that span repositories.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn artifacts(&self) -> ArtifactRepository {
        ArtifactRepository::new(self.pool.clone())
    }

    pub fn collabs(&self) -> CollabRepository {
        CollabRepository::new(self.pool.clone())
    }

    /// Orders, settlement and payouts.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    /// Events and their tickets.
    pub fn events(&self) -> EventRepository {
        EventRepository::new(self.pool.clone())
    }

    /// Venues and their seller catalog.
    pub fn venues(&self) -> VenueRepository {
        VenueRepository::new(self.pool.clone())
    }

    /// The shared slug namespace and scan log.
    pub fn qr(&self) -> QrRepository {
        QrRepository::new(self.pool.clone())
    }

    pub fn reviews(&self) -> ReviewRepository {
        ReviewRepository::new(self.pool.clone())
    }

    pub fn receipt_outbox(&self) -> ReceiptOutboxRepository {
        ReceiptOutboxRepository::new(self.pool.clone())
    }

    /// `true` if a trivial query succeeds.
    pub async fn is_reachable(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_opens_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.is_reachable().await);

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'qr_slugs'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = sqlx::query(
            r#"
            INSERT INTO tickets (id, event_id, buyer_id, status, qr_code, created_at)
            VALUES ('t-1', 'no-such-event', 'buyer', 'VALID', 'tkt_x', '2026-01-01T00:00:00Z')
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap_err();

        assert!(matches!(DbError::from(err), DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_config_defaults() {
        let file = DbConfig::new("/tmp/guild-test.db").busy_timeout(Duration::from_secs(1));
        assert_eq!(file.max_connections, 5);
        assert_eq!(file.busy_timeout, Duration::from_secs(1));
        assert!(file.migrate);
        assert!(!file.is_in_memory());

        let memory = DbConfig::in_memory();
        assert_eq!(memory.max_connections, 1);
        assert!(memory.is_in_memory());
    }
}
