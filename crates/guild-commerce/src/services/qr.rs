//! QR slug resolution.
//!
//! Slugs live in one namespace shared by artifacts, events and venues, so a
//! slug resolves to at most one entity. Every successful resolution appends
//! a scan record.

use tracing::info;

use guild_core::{QrResolution, QrScan};

use crate::error::{ApiError, ApiResult};
use crate::Commerce;

pub struct QrService<'a> {
    ctx: &'a Commerce,
}

impl<'a> QrService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        QrService { ctx }
    }

    /// Resolves `slug` to its entity and records the scan.
    pub async fn resolve(&self, slug: &str) -> ApiResult<QrResolution> {
        let scan = self
            .ctx
            .db()
            .qr()
            .record_resolution(slug)
            .await?
            .ok_or_else(|| ApiError::not_found("QR slug", slug))?;

        info!(
            slug = %scan.slug,
            entity_type = ?scan.entity_type,
            entity_id = %scan.entity_id,
            "QR slug resolved"
        );

        Ok(QrResolution {
            redirect_url: scan.entity_type.redirect_url(&scan.entity_id),
            entity_type: scan.entity_type,
            entity_id: scan.entity_id,
        })
    }

    /// Scan log for `slug`, newest first.
    pub async fn scans(&self, slug: &str) -> ApiResult<Vec<QrScan>> {
        Ok(self.ctx.db().qr().scans_for_slug(slug).await?)
    }
}
