//! Claim repository: persistence for the claim review lifecycle.
//!
//! Writes load the item's full claim set under `FOR UPDATE`, run the pure
//! planner from `refind_core::claims`, and apply the resulting writes in the
//! same transaction. The row locks serialize concurrent review actions on
//! the same item, which is what makes the approval and collection
//! mutual-exclusion invariants hold.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use refind_core::{
    plan_create_claim, plan_status_update, Claim, ClaimLedger, ClaimStatus, ClaimWrite,
    CreateDisposition, Error, NewClaim, Result, UpdateOutcome,
};

const CLAIM_COLUMNS: &str = "id, item_id, claimant_id, status, answers, admin_notes,
                    reviewed_by, created_at, updated_at, reviewed_at";

/// PostgreSQL claim repository.
#[derive(Clone)]
pub struct PgClaimRepository {
    pool: Pool<Postgres>,
}

impl PgClaimRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> Result<Claim> {
        Ok(Claim {
            id: r.get("id"),
            item_id: r.get("item_id"),
            claimant_id: r.get("claimant_id"),
            status: r
                .get::<String, _>("status")
                .parse::<ClaimStatus>()
                .map_err(Error::Internal)?,
            answers: r.get("answers"),
            admin_notes: r.get("admin_notes"),
            reviewed_by: r.get("reviewed_by"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
            reviewed_at: r.get("reviewed_at"),
        })
    }

    /// Lock the item row. This is the per-item mutex for claim writes: it
    /// also covers items that have no claim rows to lock yet.
    async fn lock_item_tx(tx: &mut Transaction<'_, Postgres>, item_id: Uuid) -> Result<()> {
        let row = sqlx::query("SELECT id FROM item WHERE id = $1 FOR UPDATE")
            .bind(item_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        if row.is_none() {
            return Err(Error::ItemNotFound(item_id));
        }
        Ok(())
    }

    /// Load all claims on an item inside the transaction, rows locked.
    async fn load_claims_tx(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
    ) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE item_id = $1 ORDER BY created_at FOR UPDATE"
        ))
        .bind(item_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    /// Apply one planner write inside the transaction.
    async fn apply_write_tx(
        tx: &mut Transaction<'_, Postgres>,
        write: &ClaimWrite,
    ) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE claim SET
                status = $1,
                admin_notes = $2,
                reviewed_by = $3,
                reviewed_at = $4,
                updated_at = $4
             WHERE id = $5",
        )
        .bind(write.status.to_string())
        .bind(&write.admin_notes)
        .bind(&write.reviewed_by)
        .bind(now)
        .bind(write.claim_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fetch_tx(tx: &mut Transaction<'_, Postgres>, claim_id: Uuid) -> Result<Claim> {
        let row = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE id = $1"
        ))
        .bind(claim_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => Self::parse_row(&r),
            None => Err(Error::ClaimNotFound(claim_id)),
        }
    }
}

#[async_trait]
impl ClaimLedger for PgClaimRepository {
    async fn create_claim(&self, req: NewClaim) -> Result<Claim> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        Self::lock_item_tx(&mut tx, req.item_id).await?;
        let existing = Self::load_claims_tx(&mut tx, req.item_id).await?;

        let disposition = plan_create_claim(req.item_id, req.claimant_id, &existing)?;
        let (status, admin_notes, reviewed_by, reviewed_at) = match disposition {
            CreateDisposition::Pending => (ClaimStatus::Pending, None, None, None),
            CreateDisposition::AutoRejected {
                admin_notes,
                reviewed_by,
            } => (
                ClaimStatus::Rejected,
                Some(admin_notes.to_string()),
                Some(reviewed_by.to_string()),
                Some(Utc::now()),
            ),
        };

        let id = refind_core::new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO claim (id, item_id, claimant_id, status, answers, admin_notes,
                                reviewed_by, created_at, updated_at, reviewed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9)",
        )
        .bind(id)
        .bind(req.item_id)
        .bind(req.claimant_id)
        .bind(status.to_string())
        .bind(&req.answers)
        .bind(&admin_notes)
        .bind(&reviewed_by)
        .bind(now)
        .bind(reviewed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            // Unique-index backstop for a same-claimant race that slipped
            // past the planner check.
            sqlx::Error::Database(db) if db.constraint() == Some("ux_claim_item_claimant") => {
                Error::DuplicateClaim {
                    item: req.item_id,
                    claimant: req.claimant_id,
                }
            }
            _ => Error::Database(e),
        })?;

        tx.commit().await.map_err(Error::Database)?;

        if status == ClaimStatus::Rejected {
            warn!(
                subsystem = "db",
                component = "claims",
                op = "create",
                claim_id = %id,
                item_id = %req.item_id,
                "Claim auto-rejected: item already collected"
            );
        } else {
            info!(
                subsystem = "db",
                component = "claims",
                op = "create",
                claim_id = %id,
                item_id = %req.item_id,
                "Claim submitted"
            );
        }

        Ok(Claim {
            id,
            item_id: req.item_id,
            claimant_id: req.claimant_id,
            status,
            answers: req.answers,
            admin_notes,
            reviewed_by,
            created_at: now,
            updated_at: now,
            reviewed_at,
        })
    }

    async fn update_status(
        &self,
        claim_id: Uuid,
        requested: ClaimStatus,
        notes: Option<&str>,
        reviewer: &str,
    ) -> Result<Claim> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Resolve the item first (unlocked read), then take the item lock
        // and re-read the claim set under it. Lock order is always
        // item-then-claims to keep concurrent updates deadlock-free.
        let item_id: Uuid = {
            let row = sqlx::query("SELECT item_id FROM claim WHERE id = $1")
                .bind(claim_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
            match row {
                Some(r) => r.get("item_id"),
                None => return Err(Error::ClaimNotFound(claim_id)),
            }
        };
        Self::lock_item_tx(&mut tx, item_id).await?;

        let all = Self::load_claims_tx(&mut tx, item_id).await?;
        let target = all
            .iter()
            .find(|c| c.id == claim_id)
            .cloned()
            .ok_or(Error::ClaimNotFound(claim_id))?;
        let siblings: Vec<Claim> = all.into_iter().filter(|c| c.id != claim_id).collect();

        let plan = plan_status_update(&target, &siblings, requested, notes, reviewer)?;

        if let Some(write) = &plan.target {
            Self::apply_write_tx(&mut tx, write).await?;
        }
        for write in &plan.cascade {
            Self::apply_write_tx(&mut tx, write).await?;
        }

        let updated = if plan.target.is_some() {
            Self::fetch_tx(&mut tx, claim_id).await?
        } else {
            target
        };

        tx.commit().await.map_err(Error::Database)?;

        match plan.outcome {
            UpdateOutcome::Applied => info!(
                subsystem = "db",
                component = "claims",
                op = "update_status",
                claim_id = %claim_id,
                item_id = %item_id,
                status = %updated.status,
                cascade_count = plan.cascade.len(),
                "Claim status updated"
            ),
            UpdateOutcome::ForcedReject => warn!(
                subsystem = "db",
                component = "claims",
                op = "update_status",
                claim_id = %claim_id,
                item_id = %item_id,
                requested = %requested,
                "Stale review action on collected item redirected to REJECTED"
            ),
            UpdateOutcome::Unchanged => info!(
                subsystem = "db",
                component = "claims",
                op = "update_status",
                claim_id = %claim_id,
                item_id = %item_id,
                "No-op status update on terminal claim"
            ),
        }

        Ok(updated)
    }

    async fn get(&self, claim_id: Uuid) -> Result<Claim> {
        let row = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE id = $1"
        ))
        .bind(claim_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => Self::parse_row(&r),
            None => Err(Error::ClaimNotFound(claim_id)),
        }
    }

    async fn list_by_item(&self, item_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE item_id = $1 ORDER BY created_at DESC"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn list_by_claimant(&self, claimant_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim WHERE claimant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(claimant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Claim>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLAIM_COLUMNS} FROM claim ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn has_claimed(&self, item_id: Uuid, claimant_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM claim WHERE item_id = $1 AND claimant_id = $2) AS present",
        )
        .bind(item_id)
        .bind(claimant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("present"))
    }

    async fn has_collected_claim(&self, item_id: Uuid) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM claim WHERE item_id = $1 AND status = $2) AS present",
        )
        .bind(item_id)
        .bind(ClaimStatus::Collected.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.get("present"))
    }
}
