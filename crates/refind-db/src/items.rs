//! Item repository for lost/found reports.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use refind_core::{Error, Item, ItemKind, ItemStore, NewItem, Result, UpdateItem};

const ITEM_COLUMNS: &str = "id, kind, title, description, category, reported_on, location,
                    reporter_name, reporter_email, reporter_phone, owner_id, image_url,
                    created_at, updated_at";

/// PostgreSQL item repository.
#[derive(Clone)]
pub struct PgItemRepository {
    pool: Pool<Postgres>,
}

impl PgItemRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Item> {
        Ok(Item {
            id: r.get("id"),
            kind: r
                .get::<String, _>("kind")
                .parse::<ItemKind>()
                .map_err(Error::Internal)?,
            title: r.get("title"),
            description: r.get("description"),
            category: r
                .get::<String, _>("category")
                .parse()
                .map_err(Error::Internal)?,
            reported_on: r.get("reported_on"),
            location: r.get("location"),
            reporter_name: r.get("reporter_name"),
            reporter_email: r.get("reporter_email"),
            reporter_phone: r.get("reporter_phone"),
            owner_id: r.get("owner_id"),
            image_url: r.get("image_url"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        })
    }
}

#[async_trait]
impl ItemStore for PgItemRepository {
    async fn insert(&self, req: NewItem) -> Result<Uuid> {
        let id = refind_core::new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO item (id, kind, title, description, category, reported_on, location,
                               reporter_name, reporter_email, reporter_phone, owner_id,
                               image_url, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(id)
        .bind(req.kind.to_string())
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.category.to_string())
        .bind(req.reported_on)
        .bind(&req.location)
        .bind(&req.reporter_name)
        .bind(&req.reporter_email)
        .bind(&req.reporter_phone)
        .bind(req.owner_id)
        .bind(&req.image_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Item> {
        self.find(id).await?.ok_or(Error::ItemNotFound(id))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM item ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM item WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn update(&self, id: Uuid, req: UpdateItem) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE item SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                category = COALESCE($3, category),
                location = COALESCE($4, location),
                reporter_name = COALESCE($5, reporter_name),
                reporter_email = COALESCE($6, reporter_email),
                reporter_phone = COALESCE($7, reporter_phone),
                image_url = COALESCE($8, image_url),
                updated_at = $9
             WHERE id = $10",
        )
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.category.map(|c| c.to_string()))
        .bind(&req.location)
        .bind(&req.reporter_name)
        .bind(&req.reporter_email)
        .bind(&req.reporter_phone)
        .bind(&req.image_url)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ItemNotFound(id));
        }
        Ok(())
    }

    async fn count_by_kind(&self, kind: ItemKind) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM item WHERE kind = $1")
            .bind(kind.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    async fn delete_cascade(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the item row so concurrent claim/match writers serialize
        // against the delete.
        let exists = sqlx::query("SELECT id FROM item WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if exists.is_none() {
            return Err(Error::ItemNotFound(id));
        }

        // Dependents first, leaves before the rows they reference.
        sqlx::query("DELETE FROM notification WHERE item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "DELETE FROM notification WHERE match_id IN
                 (SELECT id FROM item_match WHERE lost_item_id = $1 OR found_item_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("DELETE FROM item_match WHERE lost_item_id = $1 OR found_item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM claim WHERE item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM item_embedding WHERE item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM item WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "items",
            op = "delete_cascade",
            item_id = %id,
            "Deleted item and all dependents"
        );
        Ok(())
    }
}
