//! Core data models for refind.
//!
//! These types are shared across all refind crates and represent the
//! lost/found domain entities: items, claims, embeddings, matches, and
//! notifications.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// ITEM TYPES
// =============================================================================

/// Disposition of a report: the item was lost or it was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Lost,
    Found,
}

impl ItemKind {
    /// The disposition matches are searched against.
    pub fn opposite(self) -> Self {
        match self {
            Self::Lost => Self::Found,
            Self::Found => Self::Lost,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lost => write!(f, "LOST"),
            Self::Found => write!(f, "FOUND"),
        }
    }
}

impl std::str::FromStr for ItemKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOST" => Ok(Self::Lost),
            "FOUND" => Ok(Self::Found),
            _ => Err(format!("Invalid item kind: {}", s)),
        }
    }
}

/// Category of a reported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Electronics,
    Documents,
    Clothing,
    Accessories,
    Keys,
    Bags,
    Jewelry,
    Others,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Electronics => "ELECTRONICS",
            Self::Documents => "DOCUMENTS",
            Self::Clothing => "CLOTHING",
            Self::Accessories => "ACCESSORIES",
            Self::Keys => "KEYS",
            Self::Bags => "BAGS",
            Self::Jewelry => "JEWELRY",
            Self::Others => "OTHERS",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ELECTRONICS" => Ok(Self::Electronics),
            "DOCUMENTS" => Ok(Self::Documents),
            "CLOTHING" => Ok(Self::Clothing),
            "ACCESSORIES" => Ok(Self::Accessories),
            "KEYS" => Ok(Self::Keys),
            "BAGS" => Ok(Self::Bags),
            "JEWELRY" => Ok(Self::Jewelry),
            "OTHERS" => Ok(Self::Others),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

/// A lost or found report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    /// Date the item was lost or found.
    pub reported_on: NaiveDate,
    /// Where the item was lost or found.
    pub location: String,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reporter_phone: String,
    /// Owning user account, if the report was filed by a registered user.
    pub owner_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for creating a new item report.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub kind: ItemKind,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub reported_on: NaiveDate,
    pub location: String,
    pub reporter_name: String,
    pub reporter_email: String,
    pub reporter_phone: String,
    pub owner_id: Option<Uuid>,
    pub image_url: Option<String>,
}

/// Partial item update. Only non-None fields are changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub location: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_email: Option<String>,
    pub reporter_phone: Option<String>,
    pub image_url: Option<String>,
}

/// Raw image payload attached to an embedding request.
#[derive(Debug, Clone)]
pub struct ItemImage {
    pub bytes: Vec<u8>,
    pub filename: String,
}

// =============================================================================
// CLAIM TYPES
// =============================================================================

/// Review status of a claim.
///
/// Lifecycle: `Pending → UnderReview → {Approved, Rejected}`;
/// `Approved → ReadyToCollect → Collected`. `Rejected` and `Collected`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Claimant submitted, waiting for admin review.
    Pending,
    /// An admin is reviewing the claim.
    UnderReview,
    /// Admin approved the claim.
    Approved,
    /// Admin rejected the claim (terminal).
    Rejected,
    /// Item is ready for the claimant to collect.
    ReadyToCollect,
    /// Item has been collected by the claimant (terminal).
    Collected,
}

impl ClaimStatus {
    /// Terminal states are never transitioned out of.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Collected)
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::ReadyToCollect => "READY_TO_COLLECT",
            Self::Collected => "COLLECTED",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "UNDER_REVIEW" => Ok(Self::UnderReview),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "READY_TO_COLLECT" => Ok(Self::ReadyToCollect),
            "COLLECTED" => Ok(Self::Collected),
            _ => Err(format!("Invalid claim status: {}", s)),
        }
    }
}

/// A user's assertion of ownership over an item, subject to admin review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub item_id: Uuid,
    pub claimant_id: Uuid,
    pub status: ClaimStatus,
    /// Ownership-verification Q&A supplied at submission:
    /// `[{"question": "...", "answer": "..."}, ...]`
    pub answers: JsonValue,
    pub admin_notes: Option<String>,
    /// Reviewer username, or [`crate::claims::SYSTEM_REVIEWER`] for
    /// machine-driven transitions.
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Request for submitting a new claim.
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub item_id: Uuid,
    pub claimant_id: Uuid,
    pub answers: JsonValue,
}

// =============================================================================
// EMBEDDING TYPES
// =============================================================================

/// Cached feature vectors for an item, one row per item.
///
/// The payloads are opaque JSON arrays produced by the external matching
/// service; refind never interprets them, it only shuttles them back during
/// index registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEmbedding {
    pub item_id: Uuid,
    pub text_embedding: String,
    pub image_embedding: Option<String>,
    pub has_image: bool,
    /// Whether the matching service has acknowledged index registration.
    pub registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Embedding payloads returned by the matching service.
#[derive(Debug, Clone)]
pub struct ComputedEmbeddings {
    pub text_embedding: String,
    pub image_embedding: Option<String>,
    pub has_image: bool,
}

// =============================================================================
// MATCH TYPES
// =============================================================================

/// Qualitative confidence bucket assigned by the matching service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLevel {
    High,
    Medium,
    Low,
    /// Unrecognized value from the matcher; preserved rather than rejected.
    Unknown,
}

impl std::fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for MatchLevel {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_uppercase().as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Unknown,
        })
    }
}

/// A system-proposed pairing of a lost item and a found item.
///
/// Owner references are denormalized at creation time so notification
/// targeting survives later ownership changes on the items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMatch {
    pub id: Uuid,
    pub lost_item_id: Uuid,
    pub found_item_id: Uuid,
    pub lost_user_id: Option<Uuid>,
    pub found_user_id: Option<Uuid>,
    /// Overall confidence as a percentage (0.0–100.0).
    pub confidence_score: f64,
    pub image_similarity: f64,
    pub text_similarity: f64,
    pub category_match: f64,
    pub match_level: MatchLevel,
    /// User action, not machine-derived. Independent of `dismissed`.
    pub confirmed: bool,
    /// User action, not machine-derived. Independent of `confirmed`.
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl ItemMatch {
    /// Neither confirmed nor dismissed yet.
    pub fn is_pending(&self) -> bool {
        !self.confirmed && !self.dismissed
    }

    /// Whether `user_id` owns either side of the match.
    pub fn involves_user(&self, user_id: Uuid) -> bool {
        self.lost_user_id == Some(user_id) || self.found_user_id == Some(user_id)
    }
}

/// Request for recording a newly discovered match.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub lost_item_id: Uuid,
    pub found_item_id: Uuid,
    pub lost_user_id: Option<Uuid>,
    pub found_user_id: Option<Uuid>,
    pub confidence_score: f64,
    pub image_similarity: f64,
    pub text_similarity: f64,
    pub category_match: f64,
    pub match_level: MatchLevel,
}

/// A candidate pair returned by the matching service.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub lost_item_id: Uuid,
    pub found_item_id: Uuid,
    pub confidence_score: f64,
    pub image_similarity: f64,
    pub text_similarity: f64,
    pub category_match: f64,
    pub match_level: MatchLevel,
}

/// Result of a `/matching/find` query.
///
/// `IndexMiss` signals the matcher does not know the item (cold cache or
/// restarted service) and triggers the one-shot self-heal re-registration.
#[derive(Debug, Clone)]
pub enum FindOutcome {
    Matches(Vec<MatchCandidate>),
    IndexMiss,
}

// =============================================================================
// NOTIFICATION TYPES
// =============================================================================

/// Discriminator for notification templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    MatchFound,
    MatchConfirmed,
    ItemComment,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MatchFound => "MATCH_FOUND",
            Self::MatchConfirmed => "MATCH_CONFIRMED",
            Self::ItemComment => "ITEM_COMMENT",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MATCH_FOUND" => Ok(Self::MatchFound),
            "MATCH_CONFIRMED" => Ok(Self::MatchConfirmed),
            "ITEM_COMMENT" => Ok(Self::ItemComment),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

/// A persisted user notification. Delivery (email/push) happens out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub match_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Request for appending a notification row.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub match_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
}

// =============================================================================
// USER REFERENCE
// =============================================================================

/// Stable identity of the acting user, threaded explicitly through every
/// operation instead of an ambient session lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
}
