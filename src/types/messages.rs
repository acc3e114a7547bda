//! Chat message types
//!
//! Defines the messages that make up a session's conversation history.
//! Messages are immutable once appended, except for a one-time token
//! estimate backfill into the metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Optional per-message metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    /// Message must survive compression regardless of age
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_important: bool,

    /// Welcome message, preserved like important messages
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_welcome: bool,

    /// Message is a generated compression summary
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_summary: bool,

    /// Backfilled token estimate for the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,

    /// Model that produced the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Owning session, set when the message is appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Owning user, set when the message is appended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A single message in a session's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl ChatMessage {
    /// Create a new message with a fresh id and the current timestamp
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    /// Attach metadata, builder-style
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// True if the message must be preserved by compression
    pub fn is_preserved(&self) -> bool {
        self.role == MessageRole::System
            || self.metadata.is_important
            || self.metadata.is_welcome
    }
}
