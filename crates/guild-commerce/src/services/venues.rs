//! Venues and the artifacts they stock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use guild_core::validation::{validate_required, validate_slug, validate_title};
use guild_core::{SellerCatalogItem, ShippingMode, ValidationError, Venue};

use super::{new_id, require};
use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;
use crate::Commerce;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVenue {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub address: Option<String>,
    pub qr_slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCatalogItem {
    pub artifact_id: Option<String>,
    pub local_inventory: Option<i64>,
    pub price_cents: Option<i64>,
    pub shipping_mode: Option<ShippingMode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueDetail {
    pub venue: Venue,
    pub catalog: Vec<SellerCatalogItem>,
}

pub struct VenueService<'a> {
    ctx: &'a Commerce,
}

impl<'a> VenueService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        VenueService { ctx }
    }

    pub async fn create(&self, caller: Option<&Principal>, input: NewVenue) -> ApiResult<Venue> {
        require(caller)?;

        let name = input.name.unwrap_or_default();
        let contact_email = input.contact_email.unwrap_or_default();
        validate_title("name", &name)?;
        validate_required("contactEmail", &contact_email)?;
        if let Some(slug) = &input.qr_slug {
            validate_slug(slug)?;
        }

        let venue = Venue {
            id: new_id(),
            name: name.trim().to_string(),
            contact_email: contact_email.trim().to_string(),
            address: input.address,
            qr_slug: input.qr_slug,
            created_at: Utc::now(),
        };

        self.ctx.db().venues().insert(&venue).await?;

        info!(venue_id = %venue.id, qr_slug = ?venue.qr_slug, "Venue created");
        Ok(venue)
    }

    pub async fn get(&self, venue_id: &str) -> ApiResult<VenueDetail> {
        let venue = self.load(venue_id).await?;
        let catalog = self.ctx.db().venues().catalog_for_venue(&venue.id).await?;
        Ok(VenueDetail { venue, catalog })
    }

    /// Stocks an existing artifact at the venue.
    pub async fn add_catalog_item(
        &self,
        caller: Option<&Principal>,
        venue_id: &str,
        input: NewCatalogItem,
    ) -> ApiResult<SellerCatalogItem> {
        require(caller)?;
        let venue = self.load(venue_id).await?;

        let artifact_id = input.artifact_id.unwrap_or_default();
        if self.ctx.db().artifacts().get_by_id(&artifact_id).await?.is_none() {
            return Err(ApiError::not_found("Artifact", &artifact_id));
        }

        // A zero price counts as missing
        let price_cents = input
            .price_cents
            .filter(|p| *p != 0)
            .ok_or_else(|| ValidationError::required("priceCents"))?;
        let shipping_mode = input
            .shipping_mode
            .ok_or_else(|| ValidationError::required("shippingMode"))?;

        if price_cents < 0 {
            return Err(ValidationError::MustBePositive {
                field: "priceCents".to_string(),
            }
            .into());
        }
        if matches!(input.local_inventory, Some(n) if n < 0) {
            return Err(ValidationError::OutOfRange {
                field: "localInventory".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let item = SellerCatalogItem {
            id: new_id(),
            seller_id: venue.id,
            artifact_id,
            local_inventory: input.local_inventory,
            price_cents,
            shipping_mode,
            created_at: Utc::now(),
        };

        self.ctx.db().venues().add_catalog_item(&item).await?;

        info!(
            venue_id = %item.seller_id,
            artifact_id = %item.artifact_id,
            price_cents = item.price_cents,
            "Catalog item added"
        );

        Ok(item)
    }

    async fn load(&self, venue_id: &str) -> ApiResult<Venue> {
        self.ctx
            .db()
            .venues()
            .get_by_id(venue_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Venue", venue_id))
    }
}

#[cfg(test)]
mod tests {
    use guild_core::SupplyClass;

    use super::*;
    use crate::error::ErrorCode;
    use crate::services::NewArtifact;
    use crate::testing::{adult, harness, listed};

    fn warehouse(slug: Option<&str>) -> NewVenue {
        NewVenue {
            name: Some("Warehouse".into()),
            contact_email: Some("door@warehouse.test".into()),
            address: Some("1 Dock Rd".into()),
            qr_slug: slug.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_artifact_slug_blocks_venue() {
        let h = harness().await;
        let owner = adult("owner");
        h.commerce
            .catalog()
            .create(
                Some(&owner),
                NewArtifact {
                    title: Some("Aurora".into()),
                    kind: Some(guild_core::ArtifactKind::Image),
                    supply_class: Some(SupplyClass::Common),
                    qr_slug: Some("aurora".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = h.commerce.venues().create(Some(&owner), warehouse(Some("aurora"))).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_create_requires_name_and_contact() {
        let h = harness().await;
        let venues = h.commerce.venues();

        let err = venues.create(None, warehouse(None)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);

        let mut nameless = warehouse(None);
        nameless.name = None;
        let err = venues.create(Some(&adult("a")), nameless).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let mut unreachable = warehouse(None);
        unreachable.contact_email = Some(" ".into());
        let err = venues.create(Some(&adult("a")), unreachable).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);
    }

    #[tokio::test]
    async fn test_catalog_items() {
        let h = harness().await;
        let seller = adult("seller");
        let venues = h.commerce.venues();
        let venue = venues.create(Some(&seller), warehouse(Some("warehouse"))).await.unwrap();
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 1200).await;

        let item = venues
            .add_catalog_item(
                Some(&seller),
                &venue.id,
                NewCatalogItem {
                    artifact_id: Some(art.id.clone()),
                    local_inventory: Some(4),
                    price_cents: Some(1500),
                    shipping_mode: Some(ShippingMode::SelfShip),
                },
            )
            .await
            .unwrap();
        assert_eq!(item.seller_id, venue.id);

        let detail = venues.get(&venue.id).await.unwrap();
        assert_eq!(detail.catalog.len(), 1);
        assert_eq!(detail.catalog[0].price_cents, 1500);

        let err = venues
            .add_catalog_item(
                Some(&seller),
                &venue.id,
                NewCatalogItem {
                    artifact_id: Some("missing".into()),
                    price_cents: Some(100),
                    shipping_mode: Some(ShippingMode::Pod),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = venues
            .add_catalog_item(
                Some(&seller),
                &venue.id,
                NewCatalogItem {
                    artifact_id: Some(art.id.clone()),
                    price_cents: Some(0),
                    shipping_mode: Some(ShippingMode::Pod),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = venues
            .add_catalog_item(
                Some(&seller),
                &venue.id,
                NewCatalogItem {
                    artifact_id: Some(art.id.clone()),
                    price_cents: Some(100),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = venues.get("missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
