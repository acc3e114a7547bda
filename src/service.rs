//! Composition root for the context engine
//!
//! One `ContextService` is constructed at process start with injected
//! persistence and cache collaborators, then shared (`Arc`) with the
//! chat-serving layer. There is no hidden global state.

use std::sync::Arc;

use crate::context::compressor::CompressionEngine;
use crate::errors::Result;
use crate::memory::extractor::MemoryExtractor;
use crate::memory::index::{MemoryIndex, MemoryStats};
use crate::memory::types::{FragmentType, MemoryFragment};
use crate::session::ledger::{MessageLedger, NewMessage};
use crate::session::manager::{SessionManager, SessionStats};
use crate::storage::cache::CacheTiers;
use crate::storage::store::PersistenceStore;
use crate::types::messages::ChatMessage;
use crate::types::session::{ContextSession, SessionConfigOverrides};

/// Facade over session management, the message ledger, and user memory
pub struct ContextService {
    manager: Arc<SessionManager>,
    ledger: MessageLedger,
    index: Arc<MemoryIndex>,
}

impl ContextService {
    /// Wire the engine against a persistence store and cache tiers
    pub fn new(store: Arc<dyn PersistenceStore>, caches: CacheTiers) -> Self {
        let manager = Arc::new(SessionManager::new(store.clone(), caches.session.clone()));
        let index = Arc::new(MemoryIndex::new(store, caches.memory.clone()));
        let ledger = MessageLedger::new(
            manager.clone(),
            CompressionEngine::new(caches.compression.clone()),
            MemoryExtractor::new(),
            index.clone(),
        );

        Self {
            manager,
            ledger,
            index,
        }
    }

    /// Wire with a custom extraction rule table
    pub fn with_extractor(
        store: Arc<dyn PersistenceStore>,
        caches: CacheTiers,
        extractor: MemoryExtractor,
    ) -> Self {
        let manager = Arc::new(SessionManager::new(store.clone(), caches.session.clone()));
        let index = Arc::new(MemoryIndex::new(store, caches.memory.clone()));
        let ledger = MessageLedger::new(
            manager.clone(),
            CompressionEngine::new(caches.compression.clone()),
            extractor,
            index.clone(),
        );

        Self {
            manager,
            ledger,
            index,
        }
    }

    // Session lifecycle

    pub async fn create_session(
        &self,
        user_id: &str,
        agent_id: &str,
        title: Option<String>,
        overrides: Option<SessionConfigOverrides>,
    ) -> ContextSession {
        self.manager
            .create_session(user_id, agent_id, title, overrides)
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Option<ContextSession> {
        self.manager.get_session(session_id).await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        self.manager.delete_session(session_id).await
    }

    /// Retention sweep, intended for a fixed-interval background task
    pub async fn cleanup_expired_sessions(&self) -> usize {
        self.manager.cleanup_expired_sessions().await
    }

    // Message history

    pub async fn add_message(&self, session_id: &str, new: NewMessage) -> Result<ChatMessage> {
        self.ledger.add_message(session_id, new).await
    }

    pub async fn get_messages(
        &self,
        session_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Vec<ChatMessage> {
        self.ledger.get_messages(session_id, limit, offset).await
    }

    // User memory

    pub async fn get_user_memory(
        &self,
        user_id: &str,
        fragment_type: Option<FragmentType>,
    ) -> Vec<MemoryFragment> {
        self.index.get_user_memory(user_id, fragment_type).await
    }

    pub async fn search_memory(
        &self,
        user_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Vec<MemoryFragment> {
        self.index.search_memory(user_id, query, limit).await
    }

    pub async fn purge_user_memory(&self, user_id: &str) -> Result<()> {
        self.index.purge_user_memory(user_id).await
    }

    // Admin surface

    pub async fn session_stats(&self) -> SessionStats {
        self.manager.stats().await
    }

    pub async fn memory_stats(&self, user_id: &str) -> MemoryStats {
        self.index.memory_stats(user_id).await
    }
}
