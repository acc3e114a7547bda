//! Session lifecycle: creation, lookup, deletion, retention cleanup
//!
//! Reads are cache-first with the persistence store as fallback. Writes
//! go through the cache and then the store; a store failure is logged
//! and swallowed so a mutation always completes against cache state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::storage::cache::{CacheStats, CacheTier};
use crate::storage::store::{session_key, PersistenceStore, SESSION_KEY_PREFIX};
use crate::types::session::{ContextSession, SessionConfig, SessionConfigOverrides};

/// Snapshot for the admin surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub persisted_sessions: usize,
    pub cache: CacheStats,
}

/// Session CRUD and retention over a cache + store pair
pub struct SessionManager {
    store: Arc<dyn PersistenceStore>,
    cache: Arc<dyn CacheTier>,
    /// One mutex per live session id, serializing mutations (created on
    /// demand, dropped with the session)
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Create a manager over the given store and session cache tier
    pub fn new(store: Arc<dyn PersistenceStore>, cache: Arc<dyn CacheTier>) -> Self {
        Self {
            store,
            cache,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate and persist a new session for a user/agent pair
    pub async fn create_session(
        &self,
        user_id: &str,
        agent_id: &str,
        title: Option<String>,
        overrides: Option<SessionConfigOverrides>,
    ) -> ContextSession {
        let config = match overrides {
            Some(ref o) => SessionConfig::with_overrides(o),
            None => SessionConfig::default(),
        };

        let session = ContextSession::new(user_id, agent_id, title, config);
        self.save_session(&session).await;
        session
    }

    /// Cache-first lookup; `None` when absent in both cache and store
    pub async fn get_session(&self, session_id: &str) -> Option<ContextSession> {
        let key = session_key(session_id);

        if let Some(cached) = self.cache.get(&key).await {
            match serde_json::from_value::<ContextSession>(cached) {
                Ok(session) => return Some(session),
                Err(e) => debug!(session_id, error = %e,
                    "discarding undecodable cached session"),
            }
        }

        let value = match self.store.get(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(session_id, error = %e, "failed to load session from store");
                return None;
            }
        };

        match serde_json::from_value::<ContextSession>(value) {
            Ok(session) => {
                // Repopulate the cache from the store hit
                self.cache_session(&session).await;
                Some(session)
            }
            Err(e) => {
                warn!(session_id, error = %e, "corrupt stored session, treating as absent");
                None
            }
        }
    }

    /// Remove a session from cache and store; idempotent
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let key = session_key(session_id);

        let in_store = matches!(self.store.get(&key).await, Ok(Some(_)));
        let in_cache = self.cache.delete(&key).await;

        if let Err(e) = self.store.delete(&key).await {
            warn!(session_id, error = %e, "failed to delete session from store");
        }

        self.locks.lock().await.remove(session_id);

        in_store || in_cache
    }

    /// Delete every persisted session idle past its retention window
    ///
    /// A failure on an individual session is logged and does not abort
    /// the rest of the batch.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let keys = match self.store.keys_with_prefix(SESSION_KEY_PREFIX).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "failed to enumerate sessions for cleanup");
                return 0;
            }
        };

        let now = Utc::now();
        let mut removed = 0;

        for key in keys {
            let session = match self.store.get(&key).await {
                Ok(Some(value)) => match serde_json::from_value::<ContextSession>(value) {
                    Ok(session) => session,
                    Err(e) => {
                        warn!(%key, error = %e, "skipping corrupt session during cleanup");
                        continue;
                    }
                },
                Ok(None) => continue,
                Err(e) => {
                    warn!(%key, error = %e, "skipping unreadable session during cleanup");
                    continue;
                }
            };

            if session.days_since_last_active(now) > session.config.retention_days {
                if self.delete_session(&session.id).await {
                    removed += 1;
                }
            }
        }

        removed
    }

    /// Write-through save: cache always, store best-effort
    pub async fn save_session(&self, session: &ContextSession) {
        self.cache_session(session).await;

        match serde_json::to_value(session) {
            Ok(value) => {
                if let Err(e) = self.store.set(&session_key(&session.id), value).await {
                    warn!(session_id = %session.id, error = %e,
                        "failed to persist session, cache state remains authoritative");
                }
            }
            Err(e) => warn!(session_id = %session.id, error = %e,
                "failed to serialize session for persistence"),
        }
    }

    /// Mutation lock for one session id, created on demand
    pub async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Counts for the admin surface
    pub async fn stats(&self) -> SessionStats {
        let persisted_sessions = self
            .store
            .keys_with_prefix(SESSION_KEY_PREFIX)
            .await
            .map(|keys| keys.len())
            .unwrap_or(0);

        SessionStats {
            persisted_sessions,
            cache: self.cache.stats().await,
        }
    }

    async fn cache_session(&self, session: &ContextSession) {
        let tags = [
            format!("user:{}", session.user_id),
            format!("agent:{}", session.agent_id),
        ];
        match serde_json::to_value(session) {
            Ok(value) => {
                self.cache
                    .set(&session_key(&session.id), value, &tags)
                    .await
            }
            Err(e) => debug!(session_id = %session.id, error = %e,
                "failed to serialize session for cache"),
        }
    }
}
