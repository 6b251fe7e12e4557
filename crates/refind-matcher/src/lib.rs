//! # refind-matcher
//!
//! HTTP client for the external matching service.
//!
//! The matching service owns similarity computation: it embeds item text and
//! images, keeps an in-memory index of registered items, and answers top-K
//! and batch similarity queries. This crate implements the
//! [`refind_core::MatcherBackend`] seam over its REST API, including the
//! index-miss signalling that drives re-registration after a service
//! restart.

pub mod http;

pub use http::{HttpMatcherBackend, MatcherConfig};

// Re-export core types
pub use refind_core::{ComputedEmbeddings, FindOutcome, MatchCandidate, MatcherBackend};
