//! Error types for refind.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using refind's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for refind operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    /// Claim not found
    #[error("Claim not found: {0}")]
    ClaimNotFound(Uuid),

    /// Match not found
    #[error("Match not found: {0}")]
    MatchNotFound(Uuid),

    /// Notification not found
    #[error("Notification not found: {0}")]
    NotificationNotFound(Uuid),

    /// A claimant already has a claim on the item
    #[error("Duplicate claim: user {claimant} has already claimed item {item}")]
    DuplicateClaim { item: Uuid, claimant: Uuid },

    /// Another claim on the same item is already approved
    #[error("Conflicting approval: another claim is already approved for item {0}")]
    ConflictingApproval(Uuid),

    /// The item was already handed over via another claim
    #[error("Already collected: item {0} was already handed over to a claimant")]
    AlreadyCollected(Uuid),

    /// Ownership or role check failed
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// External matching service network/5xx failure
    #[error("Matching service unavailable: {0}")]
    Upstream(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_duplicate_claim() {
        let item = Uuid::nil();
        let claimant = Uuid::nil();
        let err = Error::DuplicateClaim { item, claimant };
        assert!(err.to_string().contains("Duplicate claim"));
        assert!(err.to_string().contains(&item.to_string()));
    }

    #[test]
    fn test_error_display_conflicting_approval() {
        let id = Uuid::new_v4();
        let err = Error::ConflictingApproval(id);
        assert_eq!(
            err.to_string(),
            format!(
                "Conflicting approval: another claim is already approved for item {}",
                id
            )
        );
    }

    #[test]
    fn test_error_display_already_collected() {
        let id = Uuid::new_v4();
        let err = Error::AlreadyCollected(id);
        assert!(err.to_string().contains("Already collected"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_not_authorized() {
        let err = Error::NotAuthorized("user is not part of this match".to_string());
        assert_eq!(
            err.to_string(),
            "Not authorized: user is not part of this match"
        );
    }

    #[test]
    fn test_error_display_upstream() {
        let err = Error::Upstream("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Matching service unavailable: connection refused"
        );
    }

    #[test]
    fn test_error_display_item_not_found() {
        let id = Uuid::new_v4();
        let err = Error::ItemNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::NotFound("claim".to_string());
        assert!(format!("{:?}", err).contains("NotFound"));
    }
}
