//! Context compression for over-budget sessions
//!
//! When a session exceeds its token or message budget, the engine keeps
//! every important message, the recent tail, and folds everything else
//! into a single generated summary message.
//!
//! # Algorithm
//!
//! ```text
//! trigger:    total_tokens / max_tokens > threshold
//!          OR message_count / max_messages > threshold
//!
//! preserve:   {system | important | welcome} ∪ last-20, dedup by id,
//!             sorted ascending by timestamp
//! remove:     everything else
//! result:     [summary(removed)] + preserved   (summary only if
//!             anything was removed)
//! ```
//!
//! Results are memoized per `(session_id, updated_at)` so repeated
//! calls against an unchanged session return the cached result.
//! Compression never fails the caller; a broken cache only costs the
//! memoization.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::counter::TokenCounter;
use crate::storage::cache::CacheTier;
use crate::types::messages::{ChatMessage, MessageMetadata, MessageRole};
use crate::types::session::ContextSession;

/// Number of trailing messages always kept through compression
pub const RECENT_WINDOW: usize = 20;

/// Maximum distinct topics carried into the summary
const MAX_SUMMARY_TOPICS: usize = 5;

/// Maximum assistant key points carried into the summary
const MAX_SUMMARY_POINTS: usize = 3;

/// Summary text when the removed slice holds nothing summarizable
const EMPTY_SUMMARY: &str = "no conversation content";

/// Outcome of one compression pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompressionResult {
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    /// compressed / original token ratio; 1.0 when nothing was removed
    pub compression_ratio: f64,
    pub preserved_messages: Vec<ChatMessage>,
    pub summary_message: Option<ChatMessage>,
    pub removed_count: usize,
}

/// Compression engine with memoized results
pub struct CompressionEngine {
    counter: TokenCounter,
    cache: Arc<dyn CacheTier>,
}

impl CompressionEngine {
    /// Create an engine memoizing into the given cache tier
    pub fn new(cache: Arc<dyn CacheTier>) -> Self {
        Self {
            counter: TokenCounter::new(),
            cache,
        }
    }

    /// Check the token-ratio OR message-ratio trigger
    pub fn should_compress(&self, session: &ContextSession) -> bool {
        let token_ratio =
            session.metadata.total_tokens as f64 / session.config.max_tokens as f64;
        let message_ratio =
            session.metadata.message_count as f64 / session.config.max_messages as f64;

        token_ratio > session.config.compression_threshold
            || message_ratio > session.config.compression_threshold
    }

    /// Compress the session's message list in place
    ///
    /// Mutates `messages`, `total_tokens`, and `message_count`, but not
    /// `updated_at` — that is what keeps the memo key stable for an
    /// unchanged session.
    pub async fn compress(&self, session: &mut ContextSession) -> CompressionResult {
        let memo_key = self.memo_key(session);

        if let Some(cached) = self.cache.get(&memo_key).await {
            match serde_json::from_value::<CompressionResult>(cached) {
                Ok(result) => return result,
                Err(e) => debug!(session_id = %session.id, error = %e,
                    "discarding undecodable cached compression result"),
            }
        }

        let result = self.compress_uncached(session);

        match serde_json::to_value(&result) {
            Ok(value) => self.cache.set(&memo_key, value, &[]).await,
            Err(e) => debug!(session_id = %session.id, error = %e,
                "failed to memoize compression result"),
        }

        result
    }

    fn memo_key(&self, session: &ContextSession) -> String {
        format!(
            "compression_{}_{}",
            session.id,
            session.metadata.updated_at.timestamp_millis()
        )
    }

    fn compress_uncached(&self, session: &mut ContextSession) -> CompressionResult {
        let original_tokens = session.metadata.total_tokens;

        // Preserve important messages plus the recent tail, dedup by id
        let recent_start = session.messages.len().saturating_sub(RECENT_WINDOW);
        let mut preserved: Vec<ChatMessage> = Vec::new();

        for (idx, message) in session.messages.iter().enumerate() {
            if message.is_preserved() || idx >= recent_start {
                preserved.push(message.clone());
            }
        }
        preserved.sort_by_key(|m| m.timestamp);

        let removed: Vec<&ChatMessage> = session
            .messages
            .iter()
            .filter(|m| !preserved.iter().any(|p| p.id == m.id))
            .collect();
        let removed_count = removed.len();

        if removed_count == 0 {
            // Nothing to fold away; the session stays as-is
            return CompressionResult {
                original_tokens,
                compressed_tokens: original_tokens,
                compression_ratio: 1.0,
                preserved_messages: preserved,
                summary_message: None,
                removed_count: 0,
            };
        }

        let summary = self.build_summary_message(session, &removed);

        let mut messages = Vec::with_capacity(preserved.len() + 1);
        messages.push(summary.clone());
        messages.extend(preserved.iter().cloned());

        let compressed_tokens = messages
            .iter()
            .map(|m| {
                m.metadata
                    .tokens
                    .unwrap_or_else(|| self.counter.estimate(&m.content))
            })
            .sum();

        session.messages = messages;
        session.metadata.total_tokens = compressed_tokens;
        session.metadata.message_count = session.messages.len();

        let compression_ratio = if original_tokens > 0 {
            compressed_tokens as f64 / original_tokens as f64
        } else {
            1.0
        };

        CompressionResult {
            original_tokens,
            compressed_tokens,
            compression_ratio,
            preserved_messages: preserved,
            summary_message: Some(summary),
            removed_count,
        }
    }

    fn build_summary_message(
        &self,
        session: &ContextSession,
        removed: &[&ChatMessage],
    ) -> ChatMessage {
        let content = format!("[context summary] {}", create_summary(removed));
        let tokens = self.counter.estimate(&content);

        // Summary timestamps at the start of the removed range so the
        // [summary] + preserved list stays timestamp-ascending
        let timestamp = removed
            .iter()
            .map(|m| m.timestamp)
            .min()
            .unwrap_or_else(chrono::Utc::now);

        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: MessageRole::System,
            content,
            timestamp,
            metadata: MessageMetadata {
                is_summary: true,
                tokens: Some(tokens),
                session_id: Some(session.id.clone()),
                user_id: Some(session.user_id.clone()),
                ..Default::default()
            },
        }
    }
}

/// Summarize removed messages into topics and key points
///
/// Topics: the first 3 words longer than 2 characters from each removed
/// user message, at most 5 distinct topics overall. Key points: the
/// first 50 characters of each removed assistant message longer than 50
/// characters, at most 3.
pub fn create_summary(removed: &[&ChatMessage]) -> String {
    let mut topics: Vec<String> = Vec::new();
    let mut key_points: Vec<String> = Vec::new();

    for message in removed {
        match message.role {
            MessageRole::User => {
                if topics.len() >= MAX_SUMMARY_TOPICS {
                    continue;
                }
                for word in message
                    .content
                    .split_whitespace()
                    .filter(|w| w.len() > 2)
                    .take(3)
                {
                    if topics.len() >= MAX_SUMMARY_TOPICS {
                        break;
                    }
                    if !topics.iter().any(|t| t == word) {
                        topics.push(word.to_string());
                    }
                }
            }
            MessageRole::Assistant => {
                if key_points.len() >= MAX_SUMMARY_POINTS {
                    continue;
                }
                if message.content.chars().count() > 50 {
                    let point: String = message.content.chars().take(50).collect();
                    key_points.push(format!("{}...", point));
                }
            }
            MessageRole::System => {}
        }
    }

    let mut parts = Vec::new();
    if !topics.is_empty() {
        parts.push(format!("discussed topics: {}", topics.join(", ")));
    }
    if !key_points.is_empty() {
        parts.push(format!("key points: {}", key_points.join(" ")));
    }

    if parts.is_empty() {
        EMPTY_SUMMARY.to_string()
    } else {
        parts.join(". ")
    }
}
