//! # Review Repository

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use guild_core::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: String,
    artifact_id: String,
    reviewer_id: String,
    rating_quality: i64,
    rating_style: i64,
    rating_skill_impact: i64,
    comment: Option<String>,
    tags: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            artifact_id: row.artifact_id,
            reviewer_id: row.reviewer_id,
            rating_quality: row.rating_quality,
            rating_style: row.rating_style,
            rating_skill_impact: row.rating_skill_impact,
            comment: row.comment,
            tags: row.tags.0,
            created_at: row.created_at,
        }
    }
}

/// Repository for artifact reviews.
#[derive(Debug, Clone)]
pub struct ReviewRepository {
    pool: SqlitePool,
}

impl ReviewRepository {
    /// Creates a new ReviewRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReviewRepository { pool }
    }

    /// Inserts a review.
    pub async fn insert(&self, review: &Review) -> DbResult<()> {
        debug!(id = %review.id, artifact_id = %review.artifact_id, "Inserting review");

        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, artifact_id, reviewer_id, rating_quality, rating_style,
                rating_skill_impact, comment, tags, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&review.id)
        .bind(&review.artifact_id)
        .bind(&review.reviewer_id)
        .bind(review.rating_quality)
        .bind(review.rating_style)
        .bind(review.rating_skill_impact)
        .bind(&review.comment)
        .bind(Json(&review.tags))
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reviews of one artifact, oldest first.
    pub async fn list_for_artifact(&self, artifact_id: &str) -> DbResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, artifact_id, reviewer_id, rating_quality, rating_style,
                   rating_skill_impact, comment, tags, created_at
            FROM reviews
            WHERE artifact_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(artifact_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Every review, for discovery ranking.
    pub async fn list_all(&self) -> DbResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT id, artifact_id, reviewer_id, rating_quality, rating_style,
                   rating_skill_impact, comment, tags, created_at
            FROM reviews
            ORDER BY rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }
}
