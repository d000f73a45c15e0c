//! # QR Slug Directory Repository
//!
//! One slug namespace shared by artifacts, events and venues, plus the
//! append-only scan log.
//!
//! ## Why One Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  qr_slugs (slug PRIMARY KEY)                                            │
//! │  ┌──────────┬─────────────┬──────────────┐                              │
//! │  │ slug     │ entity_type │ entity_id    │                              │
//! │  ├──────────┼─────────────┼──────────────┤                              │
//! │  │ aurora   │ ARTIFACT    │ 3f2a…        │                              │
//! │  │ mkt-fri  │ EVENT       │ 91bc…        │                              │
//! │  └──────────┴─────────────┴──────────────┘                              │
//! │                                                                         │
//! │  Registering "aurora" for a VENUE hits the primary key → SlugTaken.    │
//! │  No read-then-insert window across the three entity tables.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use guild_core::{QrEntityType, QrScan};

#[derive(Debug, sqlx::FromRow)]
struct QrScanRow {
    id: String,
    slug: String,
    entity_type: QrEntityType,
    entity_id: String,
    scanned_at: DateTime<Utc>,
}

impl From<QrScanRow> for QrScan {
    fn from(row: QrScanRow) -> Self {
        QrScan {
            id: row.id,
            slug: row.slug,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            scanned_at: row.scanned_at,
        }
    }
}

/// Repository for the QR slug namespace.
#[derive(Debug, Clone)]
pub struct QrRepository {
    pool: SqlitePool,
}

impl QrRepository {
    /// Creates a new QrRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QrRepository { pool }
    }

    /// Claims `slug` for an entity inside the caller's transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::SlugTaken)` - slug already belongs to any entity
    pub async fn register(
        conn: &mut SqliteConnection,
        slug: &str,
        entity_type: QrEntityType,
        entity_id: &str,
    ) -> DbResult<()> {
        debug!(slug = %slug, entity_type = ?entity_type, entity_id = %entity_id, "Registering QR slug");

        sqlx::query(
            r#"
            INSERT INTO qr_slugs (slug, entity_type, entity_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(slug)
        .bind(entity_type)
        .bind(entity_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::SlugTaken(slug.to_string()),
            other => other,
        })?;

        Ok(())
    }

    /// Frees `slug` inside the caller's transaction.
    pub async fn release(conn: &mut SqliteConnection, slug: &str) -> DbResult<()> {
        debug!(slug = %slug, "Releasing QR slug");

        sqlx::query("DELETE FROM qr_slugs WHERE slug = ?1")
            .bind(slug)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Whether `slug` is registered to anything.
    pub async fn is_taken(&self, slug: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM qr_slugs WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// Resolves `slug` and appends a scan record, as one statement.
    ///
    /// ## Returns
    /// * `Ok(Some(scan))` - the recorded scan (carries entity type and id)
    /// * `Ok(None)` - slug is not registered; nothing is logged
    pub async fn record_resolution(&self, slug: &str) -> DbResult<Option<QrScan>> {
        debug!(slug = %slug, "Resolving QR slug");

        let row = sqlx::query_as::<_, QrScanRow>(
            r#"
            INSERT INTO qr_scans (id, slug, entity_type, entity_id, scanned_at)
            SELECT ?1, slug, entity_type, entity_id, ?2
            FROM qr_slugs
            WHERE slug = ?3
            RETURNING id, slug, entity_type, entity_id, scanned_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(Utc::now())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QrScan::from))
    }

    /// Scan log for a slug, newest first.
    pub async fn scans_for_slug(&self, slug: &str) -> DbResult<Vec<QrScan>> {
        let rows = sqlx::query_as::<_, QrScanRow>(
            r#"
            SELECT id, slug, entity_type, entity_id, scanned_at
            FROM qr_scans
            WHERE slug = ?1
            ORDER BY rowid DESC
            "#,
        )
        .bind(slug)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(QrScan::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
