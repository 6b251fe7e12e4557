//! # refind-db
//!
//! PostgreSQL database layer for refind.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for items, claims, embeddings, matches,
//!   and notifications
//! - The transactional claim-lifecycle executor (planner + row locks)
//! - Ordered cascade deletion of an item and its dependents
//!
//! ## Example
//!
//! ```rust,ignore
//! use refind_db::Database;
//! use refind_core::{ClaimLedger, ClaimStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/refind").await?;
//!
//!     let claim = db
//!         .claims
//!         .update_status(claim_id, ClaimStatus::Approved, None, "admin")
//!         .await?;
//!
//!     println!("Claim is now {}", claim.status);
//!     Ok(())
//! }
//! ```

pub mod claims;
pub mod embeddings;
pub mod items;
pub mod matches;
pub mod notifications;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

pub use claims::PgClaimRepository;
pub use embeddings::PgEmbeddingRepository;
pub use items::PgItemRepository;
pub use matches::PgMatchRepository;
pub use notifications::PgNotificationRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

// Re-export core types
pub use refind_core::*;

use sqlx::PgPool;

/// Aggregated database handle exposing all repositories over one pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    pub items: PgItemRepository,
    pub claims: PgClaimRepository,
    pub embeddings: PgEmbeddingRepository,
    pub matches: PgMatchRepository,
    pub notifications: PgNotificationRepository,
}

impl Database {
    /// Build a database handle from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            items: PgItemRepository::new(pool.clone()),
            claims: PgClaimRepository::new(pool.clone()),
            embeddings: PgEmbeddingRepository::new(pool.clone()),
            matches: PgMatchRepository::new(pool.clone()),
            notifications: PgNotificationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending schema migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
