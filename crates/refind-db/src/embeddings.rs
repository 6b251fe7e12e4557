//! Embedding cache repository.
//!
//! One row per item holding the opaque embedding payloads returned by the
//! matching service, plus the `registered` flag that tracks whether the
//! matcher's in-memory index has acknowledged the item.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use refind_core::{EmbeddingCache, Error, ItemEmbedding, NewEmbedding, Result};

/// PostgreSQL embedding cache.
#[derive(Clone)]
pub struct PgEmbeddingRepository {
    pool: Pool<Postgres>,
}

impl PgEmbeddingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> ItemEmbedding {
        ItemEmbedding {
            item_id: r.get("item_id"),
            text_embedding: r.get("text_embedding"),
            image_embedding: r.get("image_embedding"),
            has_image: r.get("has_image"),
            registered: r.get("registered"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }
}

#[async_trait]
impl EmbeddingCache for PgEmbeddingRepository {
    async fn upsert(&self, req: NewEmbedding) -> Result<()> {
        let now = Utc::now();
        // Re-embedding resets the registration flag: the matcher has not
        // seen the new payloads yet.
        sqlx::query(
            "INSERT INTO item_embedding
                 (item_id, text_embedding, image_embedding, has_image, registered,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, false, $5, $5)
             ON CONFLICT (item_id) DO UPDATE SET
                 text_embedding = EXCLUDED.text_embedding,
                 image_embedding = EXCLUDED.image_embedding,
                 has_image = EXCLUDED.has_image,
                 registered = false,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(req.item_id)
        .bind(&req.text_embedding)
        .bind(&req.image_embedding)
        .bind(req.has_image)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get_for_item(&self, item_id: Uuid) -> Result<Option<ItemEmbedding>> {
        let row = sqlx::query(
            "SELECT item_id, text_embedding, image_embedding, has_image, registered,
                    created_at, updated_at
             FROM item_embedding WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn list_unregistered(&self) -> Result<Vec<ItemEmbedding>> {
        let rows = sqlx::query(
            "SELECT item_id, text_embedding, image_embedding, has_image, registered,
                    created_at, updated_at
             FROM item_embedding WHERE registered = false ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn mark_registered(&self, item_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE item_embedding SET registered = true, updated_at = $1 WHERE item_id = $2",
        )
        .bind(Utc::now())
        .bind(item_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "no embedding cached for item {item_id}"
            )));
        }
        Ok(())
    }
}
