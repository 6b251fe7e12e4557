//! Match repository for proposed lost/found pairings.
//!
//! The (lost_item_id, found_item_id) pair is the idempotency key: inserts go
//! through `ON CONFLICT DO NOTHING` followed by a re-fetch, so two workers
//! discovering the same pair concurrently both end up holding the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use refind_core::{Error, ItemMatch, MatchLevel, MatchStore, NewMatch, Result};

const MATCH_COLUMNS: &str = "id, lost_item_id, found_item_id, lost_user_id, found_user_id,
                    confidence_score, image_similarity, text_similarity, category_match,
                    match_level, confirmed, dismissed, created_at, confirmed_at";

/// PostgreSQL match repository.
#[derive(Clone)]
pub struct PgMatchRepository {
    pool: Pool<Postgres>,
}

impl PgMatchRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> ItemMatch {
        // MatchLevel parsing is infallible: unrecognized values fall back
        // to Unknown.
        let level: MatchLevel = r
            .get::<String, _>("match_level")
            .parse()
            .unwrap_or(MatchLevel::Unknown);
        ItemMatch {
            id: r.get("id"),
            lost_item_id: r.get("lost_item_id"),
            found_item_id: r.get("found_item_id"),
            lost_user_id: r.get("lost_user_id"),
            found_user_id: r.get("found_user_id"),
            confidence_score: r.get("confidence_score"),
            image_similarity: r.get("image_similarity"),
            text_similarity: r.get("text_similarity"),
            category_match: r.get("category_match"),
            match_level: level,
            confirmed: r.get("confirmed"),
            dismissed: r.get("dismissed"),
            created_at: r.get("created_at"),
            confirmed_at: r.get("confirmed_at"),
        }
    }
}

#[async_trait]
impl MatchStore for PgMatchRepository {
    async fn create_or_existing(&self, req: NewMatch) -> Result<(ItemMatch, bool)> {
        let id = refind_core::new_v7();
        let result = sqlx::query(
            "INSERT INTO item_match
                 (id, lost_item_id, found_item_id, lost_user_id, found_user_id,
                  confidence_score, image_similarity, text_similarity, category_match,
                  match_level, confirmed, dismissed, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, false, false, $11)
             ON CONFLICT (lost_item_id, found_item_id) DO NOTHING",
        )
        .bind(id)
        .bind(req.lost_item_id)
        .bind(req.found_item_id)
        .bind(req.lost_user_id)
        .bind(req.found_user_id)
        .bind(req.confidence_score)
        .bind(req.image_similarity)
        .bind(req.text_similarity)
        .bind(req.category_match)
        .bind(req.match_level.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let created = result.rows_affected() == 1;
        if !created {
            debug!(
                subsystem = "db",
                component = "matches",
                op = "create_or_existing",
                lost_item_id = %req.lost_item_id,
                found_item_id = %req.found_item_id,
                "Pair already recorded, returning existing match"
            );
        }

        // Re-fetch regardless of which writer won the insert race.
        let existing = self
            .find_by_pair(req.lost_item_id, req.found_item_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "match row vanished for pair ({}, {})",
                    req.lost_item_id, req.found_item_id
                ))
            })?;
        Ok((existing, created))
    }

    async fn find_by_pair(
        &self,
        lost_item_id: Uuid,
        found_item_id: Uuid,
    ) -> Result<Option<ItemMatch>> {
        let row = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match
             WHERE lost_item_id = $1 AND found_item_id = $2"
        ))
        .bind(lost_item_id)
        .bind(found_item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn get(&self, id: Uuid) -> Result<ItemMatch> {
        let row = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).ok_or(Error::MatchNotFound(id))
    }

    async fn list_for_lost_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match
             WHERE lost_item_id = $1 ORDER BY confidence_score DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn list_for_found_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match
             WHERE found_item_id = $1 ORDER BY confidence_score DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match
             WHERE lost_user_id = $1 OR found_user_id = $1
             ORDER BY confidence_score DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn list_pending_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM item_match
             WHERE (lost_user_id = $1 OR found_user_id = $1)
               AND confirmed = false AND dismissed = false
             ORDER BY confidence_score DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn count_pending_for_user(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM item_match
             WHERE (lost_user_id = $1 OR found_user_id = $1)
               AND confirmed = false AND dismissed = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    async fn confirm(&self, id: Uuid, at: DateTime<Utc>) -> Result<ItemMatch> {
        let result = sqlx::query(
            "UPDATE item_match SET confirmed = true, confirmed_at = $1 WHERE id = $2",
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::MatchNotFound(id));
        }
        self.get(id).await
    }

    async fn dismiss(&self, id: Uuid) -> Result<ItemMatch> {
        let result = sqlx::query("UPDATE item_match SET dismissed = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::MatchNotFound(id));
        }
        self.get(id).await
    }
}
