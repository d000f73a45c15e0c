//! # Artifact Catalog
//!
//! Create, list, get, patch and delete artifacts.
//!
//! ## Access Rules
//! ```text
//! ┌──────────┬──────────────────────────────┬──────────────────────────────┐
//! │ op       │ who                          │ otherwise                    │
//! ├──────────┼──────────────────────────────┼──────────────────────────────┤
//! │ create   │ any authenticated user       │ UNAUTHENTICATED              │
//! │ list/get │ anyone the visibility allows │ filtered out / NOT_FOUND     │
//! │ patch    │ owner, collaborators         │ PERMISSION                   │
//! │ delete   │ owner, collaborators         │ PERMISSION                   │
//! └──────────┴──────────────────────────────┴──────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use guild_core::catalog::{can_edit, can_view, normalize_supply_limit};
use guild_core::validation::{validate_price_cents, validate_slug, validate_supply, validate_title};
use guild_core::{
    Artifact, ArtifactKind, License, PodProvider, SupplyClass, ValidationError, Visibility,
    DEFAULT_CURRENCY,
};
use guild_db::ArtifactFilter;

use super::{new_id, nullable, require};
use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;
use crate::Commerce;

/// Input for [`CatalogService::create`].
///
/// `title`, `kind` and `supplyClass` are optional here so a missing field is
/// reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArtifact {
    pub title: Option<String>,
    pub kind: Option<ArtifactKind>,
    pub description: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub source_repo_url: Option<String>,
    pub supply_class: Option<SupplyClass>,
    pub supply_limit: Option<i64>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    pub pod_provider: Option<PodProvider>,
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub visibility: Option<Visibility>,
    pub reviews_enabled: Option<bool>,
    pub license: Option<License>,
    pub qr_slug: Option<String>,
}

/// Input for [`CatalogService::patch`].
///
/// Absent fields are left alone; `null` clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub media_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub source_repo_url: Option<Option<String>>,
    pub supply_class: Option<SupplyClass>,
    #[serde(default, deserialize_with = "nullable")]
    pub supply_limit: Option<Option<i64>>,
    pub pod_provider: Option<PodProvider>,
    #[serde(default, deserialize_with = "nullable")]
    pub price_cents: Option<Option<i64>>,
    pub currency: Option<String>,
    pub visibility: Option<Visibility>,
    pub reviews_enabled: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub license: Option<Option<License>>,
    #[serde(default, deserialize_with = "nullable")]
    pub qr_slug: Option<Option<String>>,
    pub collaborators: Option<Vec<String>>,
}

pub struct CatalogService<'a> {
    ctx: &'a Commerce,
}

impl<'a> CatalogService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        CatalogService { ctx }
    }

    /// Creates an artifact owned by the caller.
    ///
    /// ## Checks (in order)
    /// 1. authenticated
    /// 2. title, kind, supplyClass present
    /// 3. RARE/LIMITED carry a supplyLimit
    /// 4. price not negative, slug well formed
    /// 5. slug free in the shared QR namespace → else CONFLICT
    pub async fn create(&self, caller: Option<&Principal>, input: NewArtifact) -> ApiResult<Artifact> {
        let principal = require(caller)?;

        let title = input.title.ok_or_else(|| ValidationError::required("title"))?;
        let kind = input.kind.ok_or_else(|| ValidationError::required("kind"))?;
        let supply_class = input
            .supply_class
            .ok_or_else(|| ValidationError::required("supplyClass"))?;

        validate_title("title", &title)?;
        validate_supply(supply_class, input.supply_limit)?;
        if let Some(price) = input.price_cents {
            validate_price_cents("priceCents", price)?;
        }
        if let Some(slug) = &input.qr_slug {
            validate_slug(slug)?;
        }

        let now = Utc::now();
        let artifact = Artifact {
            id: new_id(),
            owner_id: principal.user_id.clone(),
            collaborators: input.collaborators,
            title: title.trim().to_string(),
            kind,
            description: input.description,
            media_urls: input.media_urls,
            source_repo_url: input.source_repo_url,
            supply_class,
            supply_limit: normalize_supply_limit(supply_class, input.supply_limit),
            supply_sold: 0,
            pod_provider: input.pod_provider.unwrap_or_default(),
            price_cents: input.price_cents,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            visibility: input.visibility.unwrap_or_default(),
            reviews_enabled: input.reviews_enabled.unwrap_or(true),
            license: input.license,
            qr_slug: input.qr_slug,
            created_at: now,
            updated_at: now,
        };

        self.ctx.db().artifacts().insert(&artifact).await?;

        info!(
            artifact_id = %artifact.id,
            owner_id = %artifact.owner_id,
            supply_class = ?artifact.supply_class,
            qr_slug = ?artifact.qr_slug,
            "Artifact created"
        );

        Ok(artifact)
    }

    /// Artifacts matching `filter` that the caller may view, oldest first.
    pub async fn list(&self, caller: Option<&Principal>, filter: &ArtifactFilter) -> ApiResult<Vec<Artifact>> {
        let viewer = caller.map(|p| p.user_id.as_str());
        let artifacts = self.ctx.db().artifacts().list(filter).await?;

        Ok(artifacts
            .into_iter()
            .filter(|a| can_view(a, viewer))
            .collect())
    }

    /// An artifact the caller may view. Hidden artifacts report NOT_FOUND.
    pub async fn get(&self, caller: Option<&Principal>, artifact_id: &str) -> ApiResult<Artifact> {
        let viewer = caller.map(|p| p.user_id.as_str());

        match self.ctx.db().artifacts().get_by_id(artifact_id).await? {
            Some(artifact) if can_view(&artifact, viewer) => Ok(artifact),
            _ => Err(ApiError::not_found("Artifact", artifact_id)),
        }
    }

    /// Applies a partial update.
    ///
    /// Supply normalisation runs after the fields are applied, so switching to
    /// COMMON always drops the limit. A limit below the units already sold is
    /// refused.
    pub async fn patch(
        &self,
        caller: Option<&Principal>,
        artifact_id: &str,
        patch: ArtifactPatch,
    ) -> ApiResult<Artifact> {
        let principal = require(caller)?;

        let mut artifact = self
            .ctx
            .db()
            .artifacts()
            .get_by_id(artifact_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Artifact", artifact_id))?;

        if !can_edit(&artifact, &principal.user_id) {
            return Err(ApiError::permission("Forbidden"));
        }

        let previous_slug = artifact.qr_slug.clone();

        if let Some(title) = patch.title {
            validate_title("title", &title)?;
            artifact.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            artifact.description = description;
        }
        if let Some(media_urls) = patch.media_urls {
            artifact.media_urls = media_urls;
        }
        if let Some(url) = patch.source_repo_url {
            artifact.source_repo_url = url;
        }
        if let Some(class) = patch.supply_class {
            artifact.supply_class = class;
        }
        if let Some(limit) = patch.supply_limit {
            artifact.supply_limit = limit;
        }
        if let Some(provider) = patch.pod_provider {
            artifact.pod_provider = provider;
        }
        if let Some(price) = patch.price_cents {
            if let Some(cents) = price {
                validate_price_cents("priceCents", cents)?;
            }
            artifact.price_cents = price;
        }
        if let Some(currency) = patch.currency {
            artifact.currency = currency;
        }
        if let Some(visibility) = patch.visibility {
            artifact.visibility = visibility;
        }
        if let Some(enabled) = patch.reviews_enabled {
            artifact.reviews_enabled = enabled;
        }
        if let Some(license) = patch.license {
            artifact.license = license;
        }
        if let Some(slug) = patch.qr_slug {
            if let Some(s) = &slug {
                validate_slug(s)?;
            }
            artifact.qr_slug = slug;
        }
        if let Some(collaborators) = patch.collaborators {
            artifact.collaborators = collaborators;
        }

        validate_supply(artifact.supply_class, artifact.supply_limit)?;
        artifact.supply_limit = normalize_supply_limit(artifact.supply_class, artifact.supply_limit);
        if let Some(limit) = artifact.supply_limit {
            if limit < artifact.supply_sold {
                return Err(ValidationError::OutOfRange {
                    field: "supplyLimit".to_string(),
                    min: artifact.supply_sold,
                    max: i64::MAX,
                }
                .into());
            }
        }

        artifact.updated_at = Utc::now();
        self.ctx
            .db()
            .artifacts()
            .update(&artifact, previous_slug.as_deref())
            .await?;

        info!(artifact_id = %artifact.id, editor = %principal.user_id, "Artifact updated");
        Ok(artifact)
    }

    /// Deletes an artifact and frees its slug.
    pub async fn delete(&self, caller: Option<&Principal>, artifact_id: &str) -> ApiResult<()> {
        let principal = require(caller)?;

        let artifact = self
            .ctx
            .db()
            .artifacts()
            .get_by_id(artifact_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Artifact", artifact_id))?;

        if !can_edit(&artifact, &principal.user_id) {
            return Err(ApiError::permission("Forbidden"));
        }

        if !self.ctx.db().artifacts().delete(artifact_id).await? {
            return Err(ApiError::not_found("Artifact", artifact_id));
        }

        info!(artifact_id = %artifact_id, editor = %principal.user_id, "Artifact deleted");
        Ok(())
    }
}
