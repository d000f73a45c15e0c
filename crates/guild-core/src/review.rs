//! # Reviews & Discovery Ranking
//!
//! Aggregates artifact reviews and ranks artifacts for the discovery feeds.
//!
//! ```text
//! reviews ──► averages per artifact ──► sort by metric (desc, stable) ──► top N
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Artifact, Review};
use crate::validation::validate_rating;

/// Mean of each rating dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RatingAverages {
    pub quality: f64,
    pub style: f64,
    pub skill_impact: f64,
}

/// Dimension a discovery feed ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingMetric {
    Quality,
    Style,
    SkillImpact,
}

impl RatingAverages {
    pub fn get(&self, metric: RatingMetric) -> f64 {
        match metric {
            RatingMetric::Quality => self.quality,
            RatingMetric::Style => self.style,
            RatingMetric::SkillImpact => self.skill_impact,
        }
    }
}

/// `average` is `None` when the artifact has no reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub count: usize,
    pub average: Option<RatingAverages>,
    /// Distinct tags in first-seen order.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RankedArtifact {
    pub artifact: Artifact,
    pub ratings: RatingAverages,
}

/// Checks whether `reviewer_id` may review `artifact` with these ratings.
pub fn check_reviewable(artifact: &Artifact, reviewer_id: &str, ratings: [i64; 3]) -> CoreResult<()> {
    if !artifact.reviews_enabled {
        return Err(CoreError::ReviewsDisabled {
            artifact_id: artifact.id.clone(),
        });
    }
    if artifact.owner_id == reviewer_id {
        return Err(CoreError::SelfReview {
            artifact_id: artifact.id.clone(),
        });
    }

    validate_rating("ratingQuality", ratings[0])?;
    validate_rating("ratingStyle", ratings[1])?;
    validate_rating("ratingSkillImpact", ratings[2])?;
    Ok(())
}

/// Per-dimension averages, or `None` for an empty slice.
pub fn average_ratings<'a, I>(reviews: I) -> Option<RatingAverages>
where
    I: IntoIterator<Item = &'a Review>,
{
    let mut count = 0_i64;
    let (mut quality, mut style, mut skill) = (0_i64, 0_i64, 0_i64);

    for review in reviews {
        count += 1;
        quality += review.rating_quality;
        style += review.rating_style;
        skill += review.rating_skill_impact;
    }

    if count == 0 {
        return None;
    }

    let n = count as f64;
    Some(RatingAverages {
        quality: quality as f64 / n,
        style: style as f64 / n,
        skill_impact: skill as f64 / n,
    })
}

pub fn summarize(reviews: &[Review]) -> ReviewSummary {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in reviews.iter().flat_map(|r| r.tags.iter()) {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }

    ReviewSummary {
        count: reviews.len(),
        average: average_ratings(reviews),
        tags,
    }
}

/// Ranks reviewed artifacts by `metric`, highest first.
///
/// Unreviewed artifacts are left out. Ties keep catalog order.
pub fn rank_artifacts(
    artifacts: Vec<Artifact>,
    reviews: &[Review],
    metric: RatingMetric,
    limit: usize,
) -> Vec<RankedArtifact> {
    let mut ranked: Vec<RankedArtifact> = artifacts
        .into_iter()
        .filter_map(|artifact| {
            let ratings = average_ratings(reviews.iter().filter(|r| r.artifact_id == artifact.id))?;
            Some(RankedArtifact { artifact, ratings })
        })
        .collect();

    // sort_by is stable, so equal scores stay in catalog order
    ranked.sort_by(|a, b| b.ratings.get(metric).total_cmp(&a.ratings.get(metric)));
    ranked.truncate(limit);
    ranked
}
