//! Core data types shared across the engine

pub mod messages;
pub mod session;

pub use messages::{ChatMessage, MessageMetadata, MessageRole};
pub use session::{ContextSession, SessionConfig, SessionConfigOverrides, SessionMetadata};
