//! Key-value persistence store contract and reference implementations
//!
//! The engine only needs get/set/delete plus prefix enumeration over
//! JSON values. Everything is keyed with a well-known prefix so whole
//! families of records can be scanned for cleanup.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{ContextError, Result};

/// Key prefix for persisted sessions
pub const SESSION_KEY_PREFIX: &str = "context_session_";

/// Key prefix for persisted user memory collections
pub const MEMORY_KEY_PREFIX: &str = "user_memory_";

/// Storage key for a session id
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, session_id)
}

/// Storage key for a user's memory collection
pub fn memory_key(user_id: &str) -> String {
    format!("{}{}", MEMORY_KEY_PREFIX, user_id)
}

/// Durable key-value store for JSON documents
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Fetch a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value, replacing any existing one
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerate all keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory store for tests and embedded use
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// File-backed store: one pretty-printed JSON file per key
pub struct FileStore {
    storage_dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `storage_dir`, creating it if needed
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        if !storage_dir.exists() {
            fs::create_dir_all(&storage_dir)?;
        }
        Ok(Self { storage_dir })
    }

    /// Create a store under the default `~/.contextkeeper/store` directory
    pub fn default_dir() -> Result<Self> {
        let storage_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".contextkeeper")
            .join("store");
        Self::new(storage_dir)
    }

    /// Get storage directory
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl PersistenceStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&json)?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(&value)?;
        fs::write(&path, json).map_err(|e| {
            ContextError::Persistence(format!("failed to write {}: {}", path.display(), e))
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.storage_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                    if filename.starts_with(prefix) && filename.ends_with(".json") {
                        keys.push(filename.trim_end_matches(".json").to_string());
                    }
                }
            }
        }

        Ok(keys)
    }
}
