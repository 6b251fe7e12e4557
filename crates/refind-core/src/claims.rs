//! Claim lifecycle state machine.
//!
//! The decision logic is a pure planner: given the target claim, its sibling
//! claims on the same item, and the requested transition, it produces an
//! explicit write plan. Store implementations load the item's claim set
//! inside a transaction (rows locked), run the planner, and apply the plan
//! atomically — the check and the act can never be separated by a concurrent
//! writer.
//!
//! Lifecycle: `PENDING → UNDER_REVIEW → {APPROVED, REJECTED}`;
//! `APPROVED → READY_TO_COLLECT → COLLECTED`. `REJECTED` and `COLLECTED`
//! are terminal.
//!
//! Cross-claim invariants enforced here:
//! - at most one `APPROVED` claim per item at any time;
//! - at most one claim per item ever reaches `COLLECTED`;
//! - once a claim is `COLLECTED`, every other open claim on the item is
//!   force-rejected, and stale review actions are redirected to `REJECTED`
//!   instead of reopening the case.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Claim, ClaimStatus};

/// Reviewer recorded on machine-driven transitions.
pub const SYSTEM_REVIEWER: &str = "SYSTEM";

/// Auto note for claims submitted after the item was handed over.
pub const NOTE_ITEM_ALREADY_GIVEN: &str =
    "Rejected because the item was already given to an owner.";

/// Auto note for claims force-rejected when a sibling claim collected the item.
pub const NOTE_GIVEN_TO_ANOTHER: &str =
    "Rejected because the item was given to another claimant.";

/// How a new claim submission should be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateDisposition {
    /// Normal path: record the claim as `PENDING`.
    Pending,
    /// The item already has a `COLLECTED` claim. Record the new claim
    /// immediately as `REJECTED` with a system-authored audit trail instead
    /// of leaving a dangling pending request.
    AutoRejected {
        admin_notes: &'static str,
        reviewed_by: &'static str,
    },
}

/// A single resolved claim write. Fields hold the final values to persist;
/// the executor additionally stamps `reviewed_at`/`updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimWrite {
    pub claim_id: Uuid,
    pub status: ClaimStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: String,
}

/// What the planner decided for a status-update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The requested status was applied.
    Applied,
    /// The request was overridden: the item is already collected, so the
    /// target claim was force-transitioned to `REJECTED` instead.
    ForcedReject,
    /// The target claim is already terminal on a collected item; nothing
    /// to write.
    Unchanged,
}

/// Write plan for a status update: the target write (if any) plus the
/// cascade writes that must land in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdatePlan {
    pub outcome: UpdateOutcome,
    pub target: Option<ClaimWrite>,
    pub cascade: Vec<ClaimWrite>,
}

/// Decide how to record a new claim by `claimant_id` against `item_id`.
///
/// `existing` is the full claim set currently on the item.
pub fn plan_create_claim(
    item_id: Uuid,
    claimant_id: Uuid,
    existing: &[Claim],
) -> Result<CreateDisposition> {
    if existing.iter().any(|c| c.claimant_id == claimant_id) {
        return Err(Error::DuplicateClaim {
            item: item_id,
            claimant: claimant_id,
        });
    }

    if existing.iter().any(|c| c.status == ClaimStatus::Collected) {
        return Ok(CreateDisposition::AutoRejected {
            admin_notes: NOTE_ITEM_ALREADY_GIVEN,
            reviewed_by: SYSTEM_REVIEWER,
        });
    }

    Ok(CreateDisposition::Pending)
}

/// Plan a status update for `target`, given its `siblings` (the other claims
/// on the same item).
///
/// Invariant violations come back as typed errors; the two force-to-REJECTED
/// paths are intentional corrections and appear as plan writes, not errors.
pub fn plan_status_update(
    target: &Claim,
    siblings: &[Claim],
    requested: ClaimStatus,
    notes: Option<&str>,
    reviewer: &str,
) -> Result<StatusUpdatePlan> {
    let sibling_collected = siblings
        .iter()
        .any(|c| c.status == ClaimStatus::Collected);

    if requested != ClaimStatus::Collected {
        // A hand-over closed the case. Stale review actions must not reopen
        // it: redirect the target to REJECTED unless it is already terminal.
        if sibling_collected || target.status == ClaimStatus::Collected {
            if !target.status.is_terminal() {
                return Ok(StatusUpdatePlan {
                    outcome: UpdateOutcome::ForcedReject,
                    target: Some(ClaimWrite {
                        claim_id: target.id,
                        status: ClaimStatus::Rejected,
                        admin_notes: keep_or_auto(
                            target.admin_notes.as_deref(),
                            NOTE_GIVEN_TO_ANOTHER,
                        ),
                        reviewed_by: reviewer.to_string(),
                    }),
                    cascade: Vec::new(),
                });
            }
            return Ok(StatusUpdatePlan {
                outcome: UpdateOutcome::Unchanged,
                target: None,
                cascade: Vec::new(),
            });
        }
    } else if sibling_collected {
        return Err(Error::AlreadyCollected(target.item_id));
    }

    if requested == ClaimStatus::Approved
        && siblings.iter().any(|c| c.status == ClaimStatus::Approved)
    {
        return Err(Error::ConflictingApproval(target.item_id));
    }

    let mut cascade = Vec::new();
    if requested == ClaimStatus::Collected {
        for other in siblings {
            if other.status.is_terminal() {
                continue;
            }
            cascade.push(ClaimWrite {
                claim_id: other.id,
                status: ClaimStatus::Rejected,
                admin_notes: keep_or_auto(other.admin_notes.as_deref(), NOTE_GIVEN_TO_ANOTHER),
                reviewed_by: reviewer.to_string(),
            });
        }
    }

    Ok(StatusUpdatePlan {
        outcome: UpdateOutcome::Applied,
        target: Some(ClaimWrite {
            claim_id: target.id,
            status: requested,
            admin_notes: notes.map(str::to_string),
            reviewed_by: reviewer.to_string(),
        }),
        cascade,
    })
}

/// Keep existing notes if present; fall back to the auto-generated note.
fn keep_or_auto(existing: Option<&str>, auto: &str) -> Option<String> {
    match existing {
        Some(s) if !s.trim().is_empty() => Some(s.to_string()),
        _ => Some(auto.to_string()),
    }
}
