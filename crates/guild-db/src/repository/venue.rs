//! # Venue Repository
//!
//! Venues and the seller catalog items they stock.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::qr::QrRepository;
use guild_core::{QrEntityType, SellerCatalogItem, ShippingMode, Venue};

#[derive(Debug, sqlx::FromRow)]
struct VenueRow {
    id: String,
    name: String,
    contact_email: String,
    address: Option<String>,
    qr_slug: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VenueRow> for Venue {
    fn from(row: VenueRow) -> Self {
        Venue {
            id: row.id,
            name: row.name,
            contact_email: row.contact_email,
            address: row.address,
            qr_slug: row.qr_slug,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CatalogItemRow {
    id: String,
    seller_id: String,
    artifact_id: String,
    local_inventory: Option<i64>,
    price_cents: i64,
    shipping_mode: ShippingMode,
    created_at: DateTime<Utc>,
}

impl From<CatalogItemRow> for SellerCatalogItem {
    fn from(row: CatalogItemRow) -> Self {
        SellerCatalogItem {
            id: row.id,
            seller_id: row.seller_id,
            artifact_id: row.artifact_id,
            local_inventory: row.local_inventory,
            price_cents: row.price_cents,
            shipping_mode: row.shipping_mode,
            created_at: row.created_at,
        }
    }
}

/// Repository for venues and their seller catalog.
#[derive(Debug, Clone)]
pub struct VenueRepository {
    pool: SqlitePool,
}

impl VenueRepository {
    /// Creates a new VenueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VenueRepository { pool }
    }

    /// Inserts a venue, claiming its QR slug in the same transaction.
    pub async fn insert(&self, venue: &Venue) -> DbResult<()> {
        debug!(id = %venue.id, name = %venue.name, "Inserting venue");

        let mut tx = self.pool.begin().await?;

        if let Some(slug) = &venue.qr_slug {
            QrRepository::register(&mut tx, slug, QrEntityType::Venue, &venue.id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO venues (id, name, contact_email, address, qr_slug, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&venue.id)
        .bind(&venue.name)
        .bind(&venue.contact_email)
        .bind(&venue.address)
        .bind(&venue.qr_slug)
        .bind(venue.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets a venue by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Venue>> {
        let row = sqlx::query_as::<_, VenueRow>(
            r#"
            SELECT id, name, contact_email, address, qr_slug, created_at
            FROM venues
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Venue::from))
    }

    /// First `limit` venues, oldest first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Venue>> {
        let rows = sqlx::query_as::<_, VenueRow>(
            r#"
            SELECT id, name, contact_email, address, qr_slug, created_at
            FROM venues
            ORDER BY rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Venue::from).collect())
    }

    /// Adds an item to a venue's catalog.
    pub async fn add_catalog_item(&self, item: &SellerCatalogItem) -> DbResult<()> {
        debug!(
            id = %item.id,
            venue_id = %item.seller_id,
            artifact_id = %item.artifact_id,
            "Adding seller catalog item"
        );

        sqlx::query(
            r#"
            INSERT INTO seller_catalog_items (
                id, seller_id, artifact_id, local_inventory, price_cents, shipping_mode, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&item.id)
        .bind(&item.seller_id)
        .bind(&item.artifact_id)
        .bind(item.local_inventory)
        .bind(item.price_cents)
        .bind(item.shipping_mode)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Catalog of a venue, in the order items were added.
    pub async fn catalog_for_venue(&self, venue_id: &str) -> DbResult<Vec<SellerCatalogItem>> {
        let rows = sqlx::query_as::<_, CatalogItemRow>(
            r#"
            SELECT id, seller_id, artifact_id, local_inventory, price_cents, shipping_mode, created_at
            FROM seller_catalog_items
            WHERE seller_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SellerCatalogItem::from).collect())
    }
}
