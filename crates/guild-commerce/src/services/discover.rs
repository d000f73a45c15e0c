//! # Discovery Feeds
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ role                 │ feed                                             │
//! ├──────────────────────┼──────────────────────────────────────────────────┤
//! │ EXPLORER (default)   │ top 10 reviewed artifacts by skill impact        │
//! │ CLIENT               │ top 10 reviewed artifacts by quality             │
//! │ CREATOR              │ open (DRAFT/ACTIVE) agreements + first 10 venues │
//! │ anything else        │ first 10 artifacts                               │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Artifact feeds only include artifacts the caller may view.

use serde::Serialize;
use tracing::debug;

use guild_core::catalog::can_view;
use guild_core::review::{rank_artifacts, RankedArtifact, RatingMetric};
use guild_core::{Artifact, CollabAgreement, DiscoveryRole, Venue, DISCOVERY_LIMIT};
use guild_db::ArtifactFilter;

use crate::error::ApiResult;
use crate::identity::Principal;
use crate::Commerce;

/// A discovery feed. `role` echoes the requested role, uppercased.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiscoveryFeed {
    Ranked {
        role: String,
        artifacts: Vec<RankedArtifact>,
    },
    Collaborations {
        role: String,
        collabs: Vec<CollabAgreement>,
        venues: Vec<Venue>,
    },
    Catalog {
        role: String,
        artifacts: Vec<Artifact>,
    },
}

impl DiscoveryFeed {
    pub fn role(&self) -> &str {
        match self {
            DiscoveryFeed::Ranked { role, .. }
            | DiscoveryFeed::Collaborations { role, .. }
            | DiscoveryFeed::Catalog { role, .. } => role,
        }
    }
}

pub struct DiscoveryService<'a> {
    ctx: &'a Commerce,
}

impl<'a> DiscoveryService<'a> {
    pub(crate) fn new(ctx: &'a Commerce) -> Self {
        DiscoveryService { ctx }
    }

    /// Builds the feed for `role`. `None` or an empty role means EXPLORER.
    pub async fn discover(&self, caller: Option<&Principal>, role: Option<&str>) -> ApiResult<DiscoveryFeed> {
        let role = role
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "EXPLORER".to_string());

        debug!(role = %role, "Building discovery feed");

        match parse_role(&role) {
            DiscoveryRole::Explorer => {
                let artifacts = self.ranked(caller, RatingMetric::SkillImpact).await?;
                Ok(DiscoveryFeed::Ranked { role, artifacts })
            }
            DiscoveryRole::Client => {
                let artifacts = self.ranked(caller, RatingMetric::Quality).await?;
                Ok(DiscoveryFeed::Ranked { role, artifacts })
            }
            DiscoveryRole::Creator => {
                let limit = DISCOVERY_LIMIT as u32;
                let collabs = self.ctx.db().collabs().list_open(limit).await?;
                let venues = self.ctx.db().venues().list(limit).await?;
                Ok(DiscoveryFeed::Collaborations { role, collabs, venues })
            }
            DiscoveryRole::Producer | DiscoveryRole::Other => {
                let mut artifacts = self.visible_artifacts(caller).await?;
                artifacts.truncate(DISCOVERY_LIMIT);
                Ok(DiscoveryFeed::Catalog { role, artifacts })
            }
        }
    }

    async fn ranked(&self, caller: Option<&Principal>, metric: RatingMetric) -> ApiResult<Vec<RankedArtifact>> {
        let artifacts = self.visible_artifacts(caller).await?;
        let reviews = self.ctx.db().reviews().list_all().await?;
        Ok(rank_artifacts(artifacts, &reviews, metric, DISCOVERY_LIMIT))
    }

    async fn visible_artifacts(&self, caller: Option<&Principal>) -> ApiResult<Vec<Artifact>> {
        let viewer = caller.map(|p| p.user_id.as_str());
        let artifacts = self
            .ctx
            .db()
            .artifacts()
            .list(&ArtifactFilter::default())
            .await?;

        Ok(artifacts.into_iter().filter(|a| can_view(a, viewer)).collect())
    }
}

fn parse_role(role: &str) -> DiscoveryRole {
    match role {
        "EXPLORER" => DiscoveryRole::Explorer,
        "CREATOR" => DiscoveryRole::Creator,
        "CLIENT" => DiscoveryRole::Client,
        "PRODUCER" => DiscoveryRole::Producer,
        _ => DiscoveryRole::Other,
    }
}
