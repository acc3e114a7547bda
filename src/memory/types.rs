//! Core data types for cross-session user memory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a memory fragment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FragmentType {
    Fact,
    Preference,
    Context,
    Skill,
    Relationship,
}

impl FragmentType {
    /// Stable lowercase name, used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentType::Fact => "fact",
            FragmentType::Preference => "preference",
            FragmentType::Context => "context",
            FragmentType::Skill => "skill",
            FragmentType::Relationship => "relationship",
        }
    }
}

/// A durable unit of extracted knowledge about a user
///
/// Content is immutable after creation; `access_count` and
/// `last_accessed_at` mutate when the fragment is returned by a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryFragment {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub fragment_type: FragmentType,
    pub content: String,
    /// Weight of the fragment in [0, 1]
    pub importance: f64,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MemoryFragment {
    /// Create a fragment with a fresh id and current timestamps
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        fragment_type: FragmentType,
        content: impl Into<String>,
        importance: f64,
        confidence: f64,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            fragment_type,
            content: content.into(),
            importance,
            confidence,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            tags,
        }
    }
}
