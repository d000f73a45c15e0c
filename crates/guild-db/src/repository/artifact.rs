//! # Artifact Repository
//!
//! Persistence for the artifact catalog and its sold counter.
//!
//! ## Supply Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  supply_sold only moves at settlement, through take_supply():          │
//! │                                                                         │
//! │  UPDATE artifacts SET supply_sold = supply_sold + qty                   │
//! │  WHERE id = ? AND (supply_limit IS NULL                                 │
//! │                    OR supply_sold + qty <= supply_limit)                │
//! │                                                                         │
//! │  Zero rows: not enough supply left. Patches never write the column.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::qr::QrRepository;
use guild_core::{
    Artifact, ArtifactKind, License, PodProvider, QrEntityType, SupplyClass, Visibility,
};

const ARTIFACT_COLUMNS: &str = r#"
    id, owner_id, collaborators, title, kind, description, media_urls,
    source_repo_url, supply_class, supply_limit, supply_sold, pod_provider,
    price_cents, currency, visibility, reviews_enabled, license, qr_slug,
    created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct ArtifactRow {
    id: String,
    owner_id: String,
    collaborators: Json<Vec<String>>,
    title: String,
    kind: ArtifactKind,
    description: Option<String>,
    media_urls: Json<Vec<String>>,
    source_repo_url: Option<String>,
    supply_class: SupplyClass,
    supply_limit: Option<i64>,
    supply_sold: i64,
    pod_provider: PodProvider,
    price_cents: Option<i64>,
    currency: String,
    visibility: Visibility,
    reviews_enabled: bool,
    license: Option<License>,
    qr_slug: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ArtifactRow> for Artifact {
    fn from(row: ArtifactRow) -> Self {
        Artifact {
            id: row.id,
            owner_id: row.owner_id,
            collaborators: row.collaborators.0,
            title: row.title,
            kind: row.kind,
            description: row.description,
            media_urls: row.media_urls.0,
            source_repo_url: row.source_repo_url,
            supply_class: row.supply_class,
            supply_limit: row.supply_limit,
            supply_sold: row.supply_sold,
            pod_provider: row.pod_provider,
            price_cents: row.price_cents,
            currency: row.currency,
            visibility: row.visibility,
            reviews_enabled: row.reviews_enabled,
            license: row.license,
            qr_slug: row.qr_slug,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Optional list filters. `None` matches everything.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub owner_id: Option<String>,
    pub kind: Option<ArtifactKind>,
    pub visibility: Option<Visibility>,
}

/// Repository for artifact database operations.
#[derive(Debug, Clone)]
pub struct ArtifactRepository {
    pool: SqlitePool,
}

impl ArtifactRepository {
    /// Creates a new ArtifactRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ArtifactRepository { pool }
    }

    /// Inserts a new artifact, claiming its QR slug in the same transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::SlugTaken)` - the slug belongs to another entity
    pub async fn insert(&self, artifact: &Artifact) -> DbResult<()> {
        debug!(id = %artifact.id, owner = %artifact.owner_id, "Inserting artifact");

        let mut tx = self.pool.begin().await?;

        if let Some(slug) = &artifact.qr_slug {
            QrRepository::register(&mut tx, slug, QrEntityType::Artifact, &artifact.id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO artifacts (
                id, owner_id, collaborators, title, kind, description, media_urls,
                source_repo_url, supply_class, supply_limit, supply_sold, pod_provider,
                price_cents, currency, visibility, reviews_enabled, license, qr_slug,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18,
                ?19, ?20
            )
            "#,
        )
        .bind(&artifact.id)
        .bind(&artifact.owner_id)
        .bind(Json(&artifact.collaborators))
        .bind(&artifact.title)
        .bind(artifact.kind)
        .bind(&artifact.description)
        .bind(Json(&artifact.media_urls))
        .bind(&artifact.source_repo_url)
        .bind(artifact.supply_class)
        .bind(artifact.supply_limit)
        .bind(artifact.supply_sold)
        .bind(artifact.pod_provider)
        .bind(artifact.price_cents)
        .bind(&artifact.currency)
        .bind(artifact.visibility)
        .bind(artifact.reviews_enabled)
        .bind(artifact.license)
        .bind(&artifact.qr_slug)
        .bind(artifact.created_at)
        .bind(artifact.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets an artifact by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Artifact>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_in(&mut conn, id).await
    }

    /// Reads an artifact on the caller's connection or transaction.
    pub async fn fetch_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Artifact>> {
        let sql = format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1");

        let row = sqlx::query_as::<_, ArtifactRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(Artifact::from))
    }

    /// Lists artifacts matching the filter, oldest first.
    pub async fn list(&self, filter: &ArtifactFilter) -> DbResult<Vec<Artifact>> {
        debug!(?filter, "Listing artifacts");

        let sql = format!(
            r#"
            SELECT {ARTIFACT_COLUMNS}
            FROM artifacts
            WHERE (?1 IS NULL OR owner_id = ?1)
              AND (?2 IS NULL OR kind = ?2)
              AND (?3 IS NULL OR visibility = ?3)
            ORDER BY rowid ASC
            "#
        );

        let rows = sqlx::query_as::<_, ArtifactRow>(&sql)
            .bind(&filter.owner_id)
            .bind(filter.kind)
            .bind(filter.visibility)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Artifact::from).collect())
    }

    /// Writes every editable column of `artifact`.
    ///
    /// `supply_sold` is never written here. When the slug changed from
    /// `previous_slug`, the old one is released and the new one claimed
    /// before the row is touched.
    pub async fn update(&self, artifact: &Artifact, previous_slug: Option<&str>) -> DbResult<()> {
        debug!(id = %artifact.id, "Updating artifact");

        let mut tx = self.pool.begin().await?;

        if artifact.qr_slug.as_deref() != previous_slug {
            if let Some(old) = previous_slug {
                QrRepository::release(&mut tx, old).await?;
            }
            if let Some(new) = &artifact.qr_slug {
                QrRepository::register(&mut tx, new, QrEntityType::Artifact, &artifact.id).await?;
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE artifacts SET
                collaborators = ?2,
                title = ?3,
                description = ?4,
                media_urls = ?5,
                source_repo_url = ?6,
                supply_class = ?7,
                supply_limit = ?8,
                pod_provider = ?9,
                price_cents = ?10,
                currency = ?11,
                visibility = ?12,
                reviews_enabled = ?13,
                license = ?14,
                qr_slug = ?15,
                updated_at = ?16
            WHERE id = ?1
            "#,
        )
        .bind(&artifact.id)
        .bind(Json(&artifact.collaborators))
        .bind(&artifact.title)
        .bind(&artifact.description)
        .bind(Json(&artifact.media_urls))
        .bind(&artifact.source_repo_url)
        .bind(artifact.supply_class)
        .bind(artifact.supply_limit)
        .bind(artifact.pod_provider)
        .bind(artifact.price_cents)
        .bind(&artifact.currency)
        .bind(artifact.visibility)
        .bind(artifact.reviews_enabled)
        .bind(artifact.license)
        .bind(&artifact.qr_slug)
        .bind(artifact.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Artifact", &artifact.id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Deletes an artifact and releases its slug.
    ///
    /// ## Returns
    /// `true` if a row was deleted.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        debug!(id = %id, "Deleting artifact");

        let mut tx = self.pool.begin().await?;

        let deleted: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM artifacts WHERE id = ?1 RETURNING qr_slug")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(slug) = deleted else {
            return Ok(false);
        };

        if let Some(slug) = slug {
            QrRepository::release(&mut tx, &slug).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Adds `quantity` sold units if they fit under the limit.
    ///
    /// ## Returns
    /// The new `supply_sold`, or `None` if the artifact is gone or fewer
    /// than `quantity` units remain. The counter is untouched in that case.
    pub async fn take_supply(
        conn: &mut SqliteConnection,
        id: &str,
        quantity: i64,
    ) -> DbResult<Option<i64>> {
        let sold: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE artifacts SET
                supply_sold = CASE
                    WHEN supply_limit IS NULL THEN supply_sold + ?2
                    ELSE MIN(supply_sold + ?2, supply_limit)
                END,
                updated_at = ?3
            WHERE id = ?1
              AND (supply_limit IS NULL OR supply_sold + ?2 <= supply_limit)
            RETURNING supply_sold
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sold)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
