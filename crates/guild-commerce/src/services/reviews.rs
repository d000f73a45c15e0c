//! # Artifact Reviews
//!
//! Reviews rate an artifact on three 1–5 dimensions. The owner cannot
//! review their own artifact, and owners may switch reviews off entirely.
//! Artifacts hidden from the caller behave as if they do not exist.

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use guild_core::catalog::can_view;
use guild_core::review::{check_reviewable, summarize, ReviewSummary};
use guild_core::{Artifact, Review};

use super::{new_id, require};
use crate::error::{ApiError, ApiResult};
use crate::identity::Principal;
use crate::Commerce;

/// Missing ratings decode as 0 and fail range validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    #[serde(default)]
    pub rating_quality: i64,
    #[serde(default)]
    pub rating_style: i64,
    #[serde(default)]
    pub rating_skill_impact: i64,
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct ReviewService<'a> {
    ctx: &'a Commerce,
}

impl<'a> ReviewService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        ReviewService { ctx }
    }

    pub async fn create(
        &self,
        caller: Option<&Principal>,
        artifact_id: &str,
        input: NewReview,
    ) -> ApiResult<Review> {
        let principal = require(caller)?;
        let artifact = self.load_visible(Some(principal), artifact_id).await?;

        check_reviewable(
            &artifact,
            &principal.user_id,
            [input.rating_quality, input.rating_style, input.rating_skill_impact],
        )?;

        let review = Review {
            id: new_id(),
            artifact_id: artifact.id,
            reviewer_id: principal.user_id.clone(),
            rating_quality: input.rating_quality,
            rating_style: input.rating_style,
            rating_skill_impact: input.rating_skill_impact,
            comment: input.comment,
            tags: input.tags,
            created_at: Utc::now(),
        };

        self.ctx.db().reviews().insert(&review).await?;

        info!(
            review_id = %review.id,
            artifact_id = %review.artifact_id,
            reviewer_id = %review.reviewer_id,
            "Review created"
        );

        Ok(review)
    }

    pub async fn list(&self, caller: Option<&Principal>, artifact_id: &str) -> ApiResult<Vec<Review>> {
        let artifact = self.load_visible(caller, artifact_id).await?;
        Ok(self.ctx.db().reviews().list_for_artifact(&artifact.id).await?)
    }

    /// Per-dimension averages and the distinct tags of an artifact's reviews.
    pub async fn summary(&self, caller: Option<&Principal>, artifact_id: &str) -> ApiResult<ReviewSummary> {
        let reviews = self.list(caller, artifact_id).await?;
        Ok(summarize(&reviews))
    }

    async fn load_visible(&self, caller: Option<&Principal>, artifact_id: &str) -> ApiResult<Artifact> {
        let viewer = caller.map(|p| p.user_id.as_str());
        match self.ctx.db().artifacts().get_by_id(artifact_id).await? {
            Some(artifact) if can_view(&artifact, viewer) => Ok(artifact),
            _ => Err(ApiError::not_found("Artifact", artifact_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use guild_core::SupplyClass;

    use super::*;
    use crate::error::ErrorCode;
    use crate::services::ArtifactPatch;
    use crate::testing::{adult, harness, listed};

    fn rating(quality: i64, style: i64, skill: i64, tags: &[&str]) -> NewReview {
        NewReview {
            rating_quality: quality,
            rating_style: style,
            rating_skill_impact: skill,
            comment: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_summary_averages_and_tags() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 100).await;
        let reviews = h.commerce.reviews();

        let empty = reviews.summary(None, &art.id).await.unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.average.is_none());

        reviews
            .create(Some(&adult("a")), &art.id, rating(5, 4, 3, &["bold", "clean"]))
            .await
            .unwrap();
        reviews
            .create(Some(&adult("b")), &art.id, rating(3, 4, 5, &["clean", "fun"]))
            .await
            .unwrap();

        let summary = reviews.summary(None, &art.id).await.unwrap();
        assert_eq!(summary.count, 2);
        let average = summary.average.unwrap();
        assert_eq!(average.quality, 4.0);
        assert_eq!(average.style, 4.0);
        assert_eq!(average.skill_impact, 4.0);
        assert_eq!(summary.tags, vec!["bold", "clean", "fun"]);

        assert_eq!(reviews.list(None, &art.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_review_rules() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 100).await;
        let reviews = h.commerce.reviews();

        let err = reviews.create(None, &art.id, rating(5, 5, 5, &[])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);

        let err = reviews
            .create(Some(&adult("owner")), &art.id, rating(5, 5, 5, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);

        let err = reviews
            .create(Some(&adult("fan")), &art.id, rating(6, 5, 5, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        // Missing ratings decode as zero
        let partial: NewReview = serde_json::from_str(r#"{"ratingQuality":4,"ratingStyle":4}"#).unwrap();
        let err = reviews.create(Some(&adult("fan")), &art.id, partial).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Validation);

        let err = reviews
            .create(Some(&adult("fan")), "missing", rating(5, 5, 5, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        h.commerce
            .catalog()
            .patch(
                Some(&adult("owner")),
                &art.id,
                ArtifactPatch {
                    reviews_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = reviews
            .create(Some(&adult("fan")), &art.id, rating(5, 5, 5, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BusinessRule);
    }

    #[tokio::test]
    async fn test_hidden_artifact_reviews_are_not_found() {
        let h = harness().await;
        let art = listed(&h.commerce, "owner", SupplyClass::Common, None, 100).await;
        h.commerce
            .reviews()
            .create(Some(&adult("fan")), &art.id, rating(4, 4, 4, &[]))
            .await
            .unwrap();
        h.commerce
            .catalog()
            .patch(
                Some(&adult("owner")),
                &art.id,
                ArtifactPatch {
                    visibility: Some(guild_core::Visibility::Private),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = h.commerce.reviews().list(Some(&adult("fan")), &art.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(h.commerce.reviews().list(Some(&adult("owner")), &art.id).await.is_ok());
    }
}
