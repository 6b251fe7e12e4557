//! # refind-core
//!
//! Core types, traits, and claim lifecycle logic for refind, a lost/found
//! report coordination system.
//!
//! This crate provides the foundational data structures, the pure claim
//! state-machine planner, and the trait definitions that other refind
//! crates depend on.

pub mod claims;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use claims::{
    plan_create_claim, plan_status_update, ClaimWrite, CreateDisposition, StatusUpdatePlan,
    UpdateOutcome, NOTE_GIVEN_TO_ANOTHER, NOTE_ITEM_ALREADY_GIVEN, SYSTEM_REVIEWER,
};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{is_v7, new_v7};
