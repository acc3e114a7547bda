//! contextkeeper - Conversational context & memory engine
//!
//! Manages per-session message history with token-budget enforcement
//! via context compression, and long-lived cross-session user memory
//! with relevance-ranked retrieval.
//!
//! # Architecture
//!
//! - `context`: token estimation + compression policy
//! - `session`: session lifecycle + append-only message ledger
//! - `memory`: heuristic extraction + scored fragment index
//! - `storage`: persistence store and cache tier seams
//! - `service`: the injected composition root consumers hold

pub mod errors;
pub mod types;

pub mod context;
pub mod memory;
pub mod session;
pub mod storage;

pub mod service;

// Re-export commonly used types
pub use errors::{ContextError, Result};
pub use service::ContextService;
