//! # guild-db
//!
//! SQLite persistence for the commerce core, via sqlx.
//!
//! ```text
//!   guild-commerce services
//!            │  db.orders(), db.events(), db.qr() ...
//!            ▼
//!   ┌──────────────────────────────┐
//!   │ Database (pool.rs)           │──► migrations/sqlite/*.sql (embedded)
//!   │   one repository per table   │
//!   │   group, built on demand     │
//!   └──────────────┬───────────────┘
//!                  ▼
//!              guild.db (WAL)
//! ```
//!
//! Repositories own the SQL. Anything that must hold under concurrent
//! writers (supply counters, event capacity, order settlement, ticket
//! redemption) is a single conditional statement here, never a
//! read-then-write in the service layer.
//!
//! ```rust,ignore
//! use guild_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("guild.db")).await?;
//! let order = db.orders().get_by_payment_intent("pi_...").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::artifact::{ArtifactFilter, ArtifactRepository};
pub use repository::collab::CollabRepository;
pub use repository::event::EventRepository;
pub use repository::order::{OrderRepository, SettlementRecord};
pub use repository::qr::QrRepository;
pub use repository::receipt::ReceiptOutboxRepository;
pub use repository::review::ReviewRepository;
pub use repository::venue::VenueRepository;
