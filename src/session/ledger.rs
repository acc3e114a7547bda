//! Append-only message ledger with budget enforcement
//!
//! `add_message` is the single mutation path for a session's history:
//! it serializes on the per-session lock, keeps the running token total
//! in sync, runs compression synchronously when a budget trigger fires,
//! and feeds user messages to the memory extractor as a side effect.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::types::MessageMetadata;

use crate::context::compressor::CompressionEngine;
use crate::context::counter::TokenCounter;
use crate::errors::{ContextError, Result};
use crate::memory::extractor::MemoryExtractor;
use crate::memory::index::MemoryIndex;
use crate::session::manager::SessionManager;
use crate::types::messages::{ChatMessage, MessageRole};

/// Input for [`MessageLedger::add_message`]
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
}

impl NewMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Per-session message sequence driver
pub struct MessageLedger {
    manager: Arc<SessionManager>,
    engine: CompressionEngine,
    extractor: MemoryExtractor,
    index: Arc<MemoryIndex>,
    counter: TokenCounter,
}

impl MessageLedger {
    pub fn new(
        manager: Arc<SessionManager>,
        engine: CompressionEngine,
        extractor: MemoryExtractor,
        index: Arc<MemoryIndex>,
    ) -> Self {
        Self {
            manager,
            engine,
            extractor,
            index,
            counter: TokenCounter::new(),
        }
    }

    /// Append a message to a session
    ///
    /// Fails with [`ContextError::SessionNotFound`] for an unknown id.
    /// If the post-append state exceeds a budget threshold, compression
    /// runs before this returns.
    pub async fn add_message(&self, session_id: &str, new: NewMessage) -> Result<ChatMessage> {
        let lock = self.manager.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self
            .manager
            .get_session(session_id)
            .await
            .ok_or_else(|| ContextError::SessionNotFound(session_id.to_string()))?;

        let now = Utc::now();
        let tokens = self.counter.estimate(&new.content);

        let mut metadata = new.metadata.unwrap_or_default();
        metadata.tokens = Some(tokens);
        metadata.session_id = Some(session.id.clone());
        metadata.user_id = Some(session.user_id.clone());

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: new.role,
            content: new.content,
            timestamp: now,
            metadata,
        };

        session.messages.push(message.clone());
        session.metadata.message_count = session.messages.len();
        session.metadata.total_tokens += tokens;
        session.metadata.last_active_at = now;
        session.metadata.updated_at = now;

        if self.engine.should_compress(&session) {
            self.engine.compress(&mut session).await;
        }

        self.manager.save_session(&session).await;

        if message.role == MessageRole::User {
            let fragments = self.extractor.extract(&message, &session);
            if !fragments.is_empty() {
                if let Err(e) = self.index.remember(&session.user_id, fragments).await {
                    warn!(session_id, error = %e, "failed to persist extracted memory");
                }
            }
        }

        Ok(message)
    }

    /// Read a window of the session's history
    ///
    /// A missing session yields an empty sequence, not an error.
    pub async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Vec<ChatMessage> {
        let session = match self.manager.get_session(session_id).await {
            Some(session) => session,
            None => return Vec::new(),
        };

        let offset = offset.unwrap_or(0);
        let iter = session.messages.into_iter().skip(offset);
        match limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
