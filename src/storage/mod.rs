//! Storage seams: durable key-value persistence and cache tiers
//!
//! Both are external collaborators in deployment; the traits here pin
//! the contract the engine needs, with in-memory and file-backed
//! reference implementations.

pub mod cache;
pub mod store;

pub use cache::{CacheStats, CacheTier, CacheTiers, CacheTiersConfig, InMemoryCache};
pub use store::{memory_key, session_key, FileStore, MemoryStore, PersistenceStore};
pub use store::{MEMORY_KEY_PREFIX, SESSION_KEY_PREFIX};
