//! # Collaboration Agreement Repository
//!
//! Agreements and their ordered splits. A partial unique index allows at
//! most one ACTIVE agreement per artifact; activating a second one fails
//! with `UniqueViolation`.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use guild_core::{AgreementStatus, CollabAgreement, CollabSplit};

#[derive(Debug, sqlx::FromRow)]
struct AgreementRow {
    id: String,
    artifact_id: String,
    terms_url: Option<String>,
    status: AgreementStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgreementRow {
    fn with_splits(self, splits: Vec<CollabSplit>) -> CollabAgreement {
        CollabAgreement {
            id: self.id,
            artifact_id: self.artifact_id,
            splits,
            terms_url: self.terms_url,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SplitRow {
    user_id: String,
    percent_bps: i64,
}

impl From<SplitRow> for CollabSplit {
    fn from(row: SplitRow) -> Self {
        CollabSplit {
            user_id: row.user_id,
            percent_bps: row.percent_bps as u32,
        }
    }
}

/// Repository for collaboration agreements.
#[derive(Debug, Clone)]
pub struct CollabRepository {
    pool: SqlitePool,
}

impl CollabRepository {
    /// Creates a new CollabRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CollabRepository { pool }
    }

    /// Inserts an agreement with its splits.
    pub async fn insert(&self, agreement: &CollabAgreement) -> DbResult<()> {
        debug!(
            id = %agreement.id,
            artifact_id = %agreement.artifact_id,
            splits = agreement.splits.len(),
            "Inserting collab agreement"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO collab_agreements (id, artifact_id, terms_url, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&agreement.id)
        .bind(&agreement.artifact_id)
        .bind(&agreement.terms_url)
        .bind(agreement.status)
        .bind(agreement.created_at)
        .bind(agreement.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::write_splits(&mut tx, &agreement.id, &agreement.splits).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets an agreement with its splits in stored order.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CollabAgreement>> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, AgreementRow>(
            r#"
            SELECT id, artifact_id, terms_url, status, created_at, updated_at
            FROM collab_agreements
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let splits = Self::load_splits(&mut conn, &row.id).await?;
                Ok(Some(row.with_splits(splits)))
            }
            None => Ok(None),
        }
    }

    /// Writes terms URL and status; replaces the splits when `replace_splits`.
    pub async fn update(&self, agreement: &CollabAgreement, replace_splits: bool) -> DbResult<()> {
        debug!(id = %agreement.id, status = ?agreement.status, replace_splits, "Updating collab agreement");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE collab_agreements SET
                terms_url = ?2,
                status = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&agreement.id)
        .bind(&agreement.terms_url)
        .bind(agreement.status)
        .bind(agreement.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CollabAgreement", &agreement.id));
        }

        if replace_splits {
            sqlx::query("DELETE FROM collab_splits WHERE agreement_id = ?1")
                .bind(&agreement.id)
                .execute(&mut *tx)
                .await?;
            Self::write_splits(&mut tx, &agreement.id, &agreement.splits).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The ACTIVE agreement governing settlement for an artifact, if any.
    pub async fn active_for_artifact(
        conn: &mut SqliteConnection,
        artifact_id: &str,
    ) -> DbResult<Option<CollabAgreement>> {
        let row = sqlx::query_as::<_, AgreementRow>(
            r#"
            SELECT id, artifact_id, terms_url, status, created_at, updated_at
            FROM collab_agreements
            WHERE artifact_id = ?1 AND status = 'ACTIVE'
            "#,
        )
        .bind(artifact_id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let splits = Self::load_splits(conn, &row.id).await?;
                Ok(Some(row.with_splits(splits)))
            }
            None => Ok(None),
        }
    }

    /// DRAFT and ACTIVE agreements, oldest first.
    pub async fn list_open(&self, limit: u32) -> DbResult<Vec<CollabAgreement>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, AgreementRow>(
            r#"
            SELECT id, artifact_id, terms_url, status, created_at, updated_at
            FROM collab_agreements
            WHERE status IN ('DRAFT', 'ACTIVE')
            ORDER BY rowid ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut agreements = Vec::with_capacity(rows.len());
        for row in rows {
            let splits = Self::load_splits(&mut conn, &row.id).await?;
            agreements.push(row.with_splits(splits));
        }
        Ok(agreements)
    }

    async fn load_splits(conn: &mut SqliteConnection, agreement_id: &str) -> DbResult<Vec<CollabSplit>> {
        let rows = sqlx::query_as::<_, SplitRow>(
            r#"
            SELECT user_id, percent_bps
            FROM collab_splits
            WHERE agreement_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(agreement_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(CollabSplit::from).collect())
    }

    async fn write_splits(
        conn: &mut SqliteConnection,
        agreement_id: &str,
        splits: &[CollabSplit],
    ) -> DbResult<()> {
        for (position, split) in splits.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO collab_splits (agreement_id, position, user_id, percent_bps)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(agreement_id)
            .bind(position as i64)
            .bind(&split.user_id)
            .bind(split.percent_bps)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
