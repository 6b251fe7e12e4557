//! # refind-jobs
//!
//! Matching orchestration and notification fanout.
//!
//! [`MatchingOrchestrator`] drives the pipeline that runs when a report is
//! created or refreshed: embed, register with the matcher's index, query for
//! candidates (self-healing a cold index once), record deduplicated matches,
//! and notify both owners of each new pairing. [`NotificationDispatcher`]
//! owns the notification templates and the per-user read-state operations.
//! [`SweepWorker`] reruns the batch matching and retention sweeps on an
//! interval as a background reconciliation job.
//!
//! Everything here works against the store and backend traits from
//! `refind-core`, so the pipeline is testable without PostgreSQL or a live
//! matching service.

pub mod notify;
pub mod orchestrator;
pub mod worker;

/// Default seconds between reconciliation sweeps.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

pub use notify::NotificationDispatcher;
pub use orchestrator::{MatchingConfig, MatchingOrchestrator, MatchingReport};
pub use worker::{SweepConfig, SweepHandle, SweepWorker};
