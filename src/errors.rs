//! Error types for the contextkeeper engine
//!
//! Persistence and deserialization failures are usually logged and
//! swallowed on the hot paths (the in-memory state stays authoritative);
//! only operations on an unknown session fail the caller.

use thiserror::Error;

/// Main error type for context and memory operations
#[derive(Error, Debug)]
pub enum ContextError {
    /// Operation addressed a session that does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Persistence store unreachable or rejected the operation
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Stored JSON could not be decoded into a domain object
    #[error("Deserialization failure: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// I/O errors from file-backed stores
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for context operations
pub type Result<T> = std::result::Result<T, ContextError>;
