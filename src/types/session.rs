//! Session types
//!
//! A session is a bounded conversation thread belonging to one
//! user/agent pair, with a token/message budget and retention window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::messages::ChatMessage;

/// Budget and retention configuration for a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Token budget for the whole message list
    pub max_tokens: usize,
    /// Message count budget
    pub max_messages: usize,
    /// Fraction of either budget that triggers compression, in (0, 1]
    pub compression_threshold: f64,
    /// Idle days before the session is eligible for cleanup
    pub retention_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            max_messages: 100,
            compression_threshold: 0.8,
            retention_days: 30,
        }
    }
}

/// Caller-supplied overrides for [`SessionConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfigOverrides {
    pub max_tokens: Option<usize>,
    pub max_messages: Option<usize>,
    pub compression_threshold: Option<f64>,
    pub retention_days: Option<i64>,
}

impl SessionConfig {
    /// Apply overrides on top of the defaults
    pub fn with_overrides(overrides: &SessionConfigOverrides) -> Self {
        let defaults = Self::default();
        Self {
            max_tokens: overrides.max_tokens.unwrap_or(defaults.max_tokens),
            max_messages: overrides.max_messages.unwrap_or(defaults.max_messages),
            compression_threshold: overrides
                .compression_threshold
                .unwrap_or(defaults.compression_threshold),
            retention_days: overrides.retention_days.unwrap_or(defaults.retention_days),
        }
    }
}

/// Bookkeeping state for a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Sum of per-message token estimates over `messages`
    pub total_tokens: usize,
    pub message_count: usize,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SessionMetadata {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            last_active_at: now,
            total_tokens: 0,
            message_count: 0,
            is_active: true,
            tags: Vec::new(),
            summary: None,
        }
    }
}

/// A conversation session with its full message history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextSession {
    pub id: String,
    pub user_id: String,
    pub agent_id: String,
    pub title: String,
    /// Timestamp-ascending message sequence
    pub messages: Vec<ChatMessage>,
    pub metadata: SessionMetadata,
    pub config: SessionConfig,
}

impl ContextSession {
    /// Create an empty session for a user/agent pair
    pub fn new(
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        title: Option<String>,
        config: SessionConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            title: title.unwrap_or_else(|| "New conversation".to_string()),
            messages: Vec::new(),
            metadata: SessionMetadata::new(now),
            config,
        }
    }

    /// Whole days since the session was last active
    pub fn days_since_last_active(&self, now: DateTime<Utc>) -> i64 {
        (now - self.metadata.last_active_at).num_days()
    }
}
