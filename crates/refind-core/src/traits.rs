//! Core traits for refind abstractions.
//!
//! These traits define the store and backend interfaces that concrete
//! implementations must satisfy, enabling pluggable backends and
//! testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// ITEM STORE
// =============================================================================

/// Durable store of lost/found reports.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new report.
    async fn insert(&self, req: NewItem) -> Result<Uuid>;

    /// Fetch an item by ID, failing with `ItemNotFound` if absent.
    async fn get(&self, id: Uuid) -> Result<Item>;

    /// Fetch an item by ID, `None` if absent. Used where a missing row is an
    /// expected condition (e.g. stale candidate ids from the matcher).
    async fn find(&self, id: Uuid) -> Result<Option<Item>>;

    /// List all reports, newest first.
    async fn list(&self) -> Result<Vec<Item>>;

    /// List reports filed by a user, newest first.
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Item>>;

    /// Update item fields. Only non-None fields are changed.
    async fn update(&self, id: Uuid, req: UpdateItem) -> Result<()>;

    /// Count reports by disposition.
    async fn count_by_kind(&self, kind: ItemKind) -> Result<i64>;

    /// Delete an item and all its dependents (notifications, matches,
    /// claims, embedding) as one ordered, atomic cleanup.
    async fn delete_cascade(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// CLAIM LEDGER
// =============================================================================

/// Durable per-item collection of claims.
///
/// Write operations run the [`crate::claims`] planner inside a transaction
/// that locks the item's claim set, so the cross-claim invariants hold under
/// concurrent review actions.
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    /// Submit a new claim. Enters `PENDING`, or `REJECTED` with a system
    /// audit note when the item was already handed over. Fails with
    /// `DuplicateClaim` if the claimant already claimed this item.
    async fn create_claim(&self, req: NewClaim) -> Result<Claim>;

    /// Apply an admin-driven status transition, enforcing the approval and
    /// collection mutual-exclusion invariants and cascading rejection on
    /// collection. Returns the claim as stored after the operation.
    async fn update_status(
        &self,
        claim_id: Uuid,
        requested: ClaimStatus,
        notes: Option<&str>,
        reviewer: &str,
    ) -> Result<Claim>;

    /// Fetch a claim by ID, failing with `ClaimNotFound` if absent.
    async fn get(&self, claim_id: Uuid) -> Result<Claim>;

    /// All claims on an item, newest first.
    async fn list_by_item(&self, item_id: Uuid) -> Result<Vec<Claim>>;

    /// All claims filed by a claimant, newest first.
    async fn list_by_claimant(&self, claimant_id: Uuid) -> Result<Vec<Claim>>;

    /// All claims in the system, newest first.
    async fn list_all(&self) -> Result<Vec<Claim>>;

    /// Whether the claimant already has a claim on the item.
    async fn has_claimed(&self, item_id: Uuid, claimant_id: Uuid) -> Result<bool>;

    /// Whether any claim on the item reached `COLLECTED`. This derives the
    /// item's "collected" flag; it is never stored on the item row.
    async fn has_collected_claim(&self, item_id: Uuid) -> Result<bool>;
}

// =============================================================================
// EMBEDDING CACHE
// =============================================================================

/// New or refreshed embedding payloads for an item.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub item_id: Uuid,
    pub text_embedding: String,
    pub image_embedding: Option<String>,
    pub has_image: bool,
}

/// Per-item cache of computed embeddings and their registration state.
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    /// Store embeddings for an item, replacing any existing row. The new
    /// row starts unregistered.
    async fn upsert(&self, req: NewEmbedding) -> Result<()>;

    /// Fetch the cached embeddings for an item.
    async fn get_for_item(&self, item_id: Uuid) -> Result<Option<ItemEmbedding>>;

    /// All cache entries not yet acknowledged by the matcher's index.
    /// Feeds the self-heal re-registration and the batch sweep.
    async fn list_unregistered(&self) -> Result<Vec<ItemEmbedding>>;

    /// Mark an item's embeddings as registered with the matcher.
    async fn mark_registered(&self, item_id: Uuid) -> Result<()>;
}

// =============================================================================
// MATCH STORE
// =============================================================================

/// Durable set of proposed lost/found pairings.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Record a match, or return the existing one for the same
    /// (lost, found) pair. The boolean is `true` when a new row was
    /// created. Concurrent discovery of the same pair must resolve to
    /// "return existing", never a uniqueness violation.
    async fn create_or_existing(&self, req: NewMatch) -> Result<(ItemMatch, bool)>;

    /// Look up the match for a specific pair.
    async fn find_by_pair(
        &self,
        lost_item_id: Uuid,
        found_item_id: Uuid,
    ) -> Result<Option<ItemMatch>>;

    /// Fetch a match by ID, failing with `MatchNotFound` if absent.
    async fn get(&self, id: Uuid) -> Result<ItemMatch>;

    /// Matches where the item is the lost side, descending confidence.
    async fn list_for_lost_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>>;

    /// Matches where the item is the found side, descending confidence.
    async fn list_for_found_item(&self, item_id: Uuid) -> Result<Vec<ItemMatch>>;

    /// Matches where the user owns either side, descending confidence.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>>;

    /// Matches for the user that are neither confirmed nor dismissed.
    async fn list_pending_for_user(&self, user_id: Uuid) -> Result<Vec<ItemMatch>>;

    /// Count of pending matches for the user.
    async fn count_pending_for_user(&self, user_id: Uuid) -> Result<i64>;

    /// Set the confirmed flag and stamp `confirmed_at`.
    async fn confirm(&self, id: Uuid, at: DateTime<Utc>) -> Result<ItemMatch>;

    /// Set the dismissed flag.
    async fn dismiss(&self, id: Uuid) -> Result<ItemMatch>;
}

// =============================================================================
// NOTIFICATION STORE
// =============================================================================

/// Append-mostly store of user notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Append a notification row.
    async fn insert(&self, req: NewNotification) -> Result<Uuid>;

    /// Fetch by ID, failing with `NotificationNotFound` if absent.
    async fn get(&self, id: Uuid) -> Result<Notification>;

    /// All notifications for a user, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    /// Unread notifications for a user, newest first.
    async fn list_unread_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>>;

    /// Count of unread notifications for a user.
    async fn count_unread(&self, user_id: Uuid) -> Result<i64>;

    /// Mark one notification read and stamp `read_at`.
    async fn mark_read(&self, id: Uuid) -> Result<()>;

    /// Mark all of a user's notifications read in one statement.
    /// Returns the number of rows updated.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64>;

    /// Delete one notification.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Retention sweep: delete read notifications created before `cutoff`.
    /// Returns the number of rows deleted.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

// =============================================================================
// MATCHER BACKEND
// =============================================================================

/// Client interface to the external matching service.
///
/// The service owns similarity computation end to end; refind only shuttles
/// item metadata and opaque embedding payloads across this seam.
#[async_trait]
pub trait MatcherBackend: Send + Sync {
    /// Compute embeddings for an item's text and optional image.
    async fn embed_item(
        &self,
        item: &Item,
        image: Option<&ItemImage>,
    ) -> Result<ComputedEmbeddings>;

    /// Register an item's cached embeddings with the matcher's index.
    async fn register_item(&self, item: &Item, embedding: &ItemEmbedding) -> Result<()>;

    /// Query the top-K opposite-disposition candidates for an item.
    /// A stale/cold index is reported as [`FindOutcome::IndexMiss`], not an
    /// error, so the caller can self-heal.
    async fn find_matches(&self, item_id: Uuid, top_k: u32) -> Result<FindOutcome>;

    /// All candidate pairs above the confidence threshold, across all items.
    async fn all_matches(&self, threshold: f64) -> Result<Vec<MatchCandidate>>;
}
