//! Centralized default constants for refind.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// MATCHING
// =============================================================================

/// Default base URL of the external matching service.
pub const MATCHER_URL: &str = "http://localhost:5000";

/// Candidates requested per `/matching/find` query.
pub const MATCH_TOP_K: u32 = 3;

/// Minimum confidence (0.0–1.0) for the batch `/matching/all` sweep.
/// Mirrors the matcher's own inclusion threshold.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Timeout for matcher HTTP requests (seconds). Embedding generation is the
/// slowest call; register/find are fast index operations.
pub const MATCHER_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// Age (days) after which read notifications are eligible for the
/// retention sweep.
pub const NOTIFICATION_RETENTION_DAYS: i64 = 90;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout (seconds).
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout (seconds).
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;
