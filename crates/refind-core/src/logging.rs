//! Structured logging schema and field name constants for refind.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-candidate iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "matcher", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "claims", "orchestrator", "pool", "dispatcher"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_claim", "update_status", "process_new_item"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Item UUID being operated on.
pub const ITEM_ID: &str = "item_id";

/// Claim UUID being operated on.
pub const CLAIM_ID: &str = "claim_id";

/// Match UUID being operated on.
pub const MATCH_ID: &str = "match_id";

/// Notification UUID being operated on.
pub const NOTIFICATION_ID: &str = "notification_id";

/// Acting or affected user UUID.
pub const USER_ID: &str = "user_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of candidate pairs returned by the matcher.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of match records created by an operation.
pub const MATCH_COUNT: &str = "match_count";

/// Number of claims touched by a cascade.
pub const CASCADE_COUNT: &str = "cascade_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error_msg";

#[cfg(test)]
mod tests {
    use super::*;

    // Log queries are written against these exact names; keep them in sync
    // with the fields the crates actually emit.
    #[test]
    fn field_names_match_emitted_schema() {
        assert_eq!(OPERATION, "op");
        assert_eq!(ERROR_MSG, "error_msg");
        assert_eq!(DURATION_MS, "duration_ms");
    }
}
