//! Notification repository.
//!
//! Append-mostly storage; the only mutations are read-state changes and the
//! retention sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use refind_core::{Error, NewNotification, Notification, NotificationStore, Result};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, kind, match_id, item_id,
                    is_read, created_at, read_at";

/// PostgreSQL notification repository.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Notification> {
        Ok(Notification {
            id: r.get("id"),
            user_id: r.get("user_id"),
            title: r.get("title"),
            message: r.get("message"),
            kind: r
                .get::<String, _>("kind")
                .parse()
                .map_err(Error::Internal)?,
            match_id: r.get("match_id"),
            item_id: r.get("item_id"),
            read: r.get("is_read"),
            created_at: r.get("created_at"),
            read_at: r.get("read_at"),
        })
    }
}

#[async_trait]
impl NotificationStore for PgNotificationRepository {
    async fn insert(&self, req: NewNotification) -> Result<Uuid> {
        let id = refind_core::new_v7();
        sqlx::query(
            "INSERT INTO notification (id, user_id, title, message, kind, match_id, item_id,
                                       is_read, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, false, $8)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(&req.title)
        .bind(&req.message)
        .bind(req.kind.to_string())
        .bind(req.match_id)
        .bind(req.item_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Notification> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => Self::parse_row(&r),
            None => Err(Error::NotificationNotFound(id)),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn list_unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification
             WHERE user_id = $1 AND is_read = false ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM notification WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("count"))
    }

    async fn mark_read(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notification SET is_read = true, read_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotificationNotFound(id));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        // Single statement, not a read-modify-write loop.
        let result = sqlx::query(
            "UPDATE notification SET is_read = true, read_at = $1
             WHERE user_id = $2 AND is_read = false",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notification WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotificationNotFound(id));
        }
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM notification WHERE is_read = true AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(
                subsystem = "db",
                component = "notifications",
                op = "retention_sweep",
                deleted,
                "Pruned read notifications past retention"
            );
        }
        Ok(deleted)
    }
}
