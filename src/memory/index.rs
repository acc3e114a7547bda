//! Per-user memory fragment storage with relevance-ranked search
//!
//! Reads are cache-first with the persistence store as fallback; a
//! corrupt or missing stored collection degrades to an empty one.
//! Search scores combine textual match, tag overlap, fragment
//! importance/confidence, and a 30-day exponential time decay.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::memory::types::{FragmentType, MemoryFragment};
use crate::storage::cache::CacheTier;
use crate::storage::store::{memory_key, PersistenceStore};

/// Minimum relevance score for a search hit
pub const SCORE_THRESHOLD: f64 = 0.3;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Decay time constant in days
const DECAY_DAYS: f64 = 30.0;

/// Aggregate statistics over one user's fragments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_fragments: usize,
    pub fragments_by_type: HashMap<String, usize>,
    pub average_importance: f64,
    pub total_accesses: u64,
}

/// Store-backed, cache-fronted fragment index
pub struct MemoryIndex {
    store: Arc<dyn PersistenceStore>,
    cache: Arc<dyn CacheTier>,
}

impl MemoryIndex {
    /// Create an index over the given store and memory cache tier
    pub fn new(store: Arc<dyn PersistenceStore>, cache: Arc<dyn CacheTier>) -> Self {
        Self { store, cache }
    }

    /// Fetch a user's fragments, optionally filtered by type
    ///
    /// Cache-first; on a miss the store collection is loaded, filtered,
    /// and the cache repopulated.
    pub async fn get_user_memory(
        &self,
        user_id: &str,
        fragment_type: Option<FragmentType>,
    ) -> Vec<MemoryFragment> {
        let cache_key = Self::cache_key(user_id, fragment_type);

        if let Some(cached) = self.cache.get(&cache_key).await {
            match serde_json::from_value::<Vec<MemoryFragment>>(cached) {
                Ok(fragments) => return fragments,
                Err(e) => {
                    debug!(user_id, error = %e, "discarding undecodable cached memory")
                }
            }
        }

        let mut fragments = self.load_fragments(user_id).await;
        if let Some(wanted) = fragment_type {
            fragments.retain(|f| f.fragment_type == wanted);
        }

        if let Ok(value) = serde_json::to_value(&fragments) {
            self.cache
                .set(&cache_key, value, &[Self::user_tag(user_id)])
                .await;
        }

        fragments
    }

    /// Append newly extracted fragments in one persistence write
    pub async fn remember(&self, user_id: &str, fragments: Vec<MemoryFragment>) -> Result<()> {
        if fragments.is_empty() {
            return Ok(());
        }

        let mut collection = self.load_fragments(user_id).await;
        collection.extend(fragments);
        self.write_fragments(user_id, &collection).await
    }

    /// Relevance-ranked search over a user's fragments
    ///
    /// Keeps fragments scoring above [`SCORE_THRESHOLD`], descending by
    /// score, truncated to `limit`. Returned fragments get their access
    /// bookkeeping updated and written back best-effort.
    pub async fn search_memory(
        &self,
        user_id: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Vec<MemoryFragment> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let now = Utc::now();
        let fragments = self.load_fragments(user_id).await;

        let mut scored: Vec<(f64, MemoryFragment)> = fragments
            .iter()
            .filter_map(|fragment| {
                let score = relevance_score(fragment, query, now);
                (score > SCORE_THRESHOLD).then(|| (score, fragment.clone()))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        let mut results: Vec<MemoryFragment> =
            scored.into_iter().map(|(_, f)| f).collect();

        for fragment in &mut results {
            fragment.access_count += 1;
            fragment.last_accessed_at = now;
        }
        self.record_accesses(user_id, fragments, &results).await;

        results
    }

    /// Aggregate statistics for the admin surface
    pub async fn memory_stats(&self, user_id: &str) -> MemoryStats {
        let fragments = self.load_fragments(user_id).await;

        let mut fragments_by_type: HashMap<String, usize> = HashMap::new();
        for fragment in &fragments {
            *fragments_by_type
                .entry(fragment.fragment_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        let average_importance = if fragments.is_empty() {
            0.0
        } else {
            fragments.iter().map(|f| f.importance).sum::<f64>() / fragments.len() as f64
        };

        MemoryStats {
            total_fragments: fragments.len(),
            fragments_by_type,
            average_importance,
            total_accesses: fragments.iter().map(|f| f.access_count).sum(),
        }
    }

    /// Remove a user's entire fragment collection
    pub async fn purge_user_memory(&self, user_id: &str) -> Result<()> {
        self.store.delete(&memory_key(user_id)).await?;
        self.cache.invalidate_tag(&Self::user_tag(user_id)).await;
        Ok(())
    }

    /// Load the stored collection; store or decode failures degrade to empty
    async fn load_fragments(&self, user_id: &str) -> Vec<MemoryFragment> {
        let value = match self.store.get(&memory_key(user_id)).await {
            Ok(Some(value)) => value,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(user_id, error = %e, "failed to load user memory, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_value(value) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(user_id, error = %e, "corrupt stored user memory, treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_fragments(&self, user_id: &str, fragments: &[MemoryFragment]) -> Result<()> {
        let value = serde_json::to_value(fragments)?;
        self.store.set(&memory_key(user_id), value).await?;
        self.cache.invalidate_tag(&Self::user_tag(user_id)).await;
        Ok(())
    }

    /// Write back bumped access counters; failures only cost the bookkeeping
    async fn record_accesses(
        &self,
        user_id: &str,
        mut collection: Vec<MemoryFragment>,
        accessed: &[MemoryFragment],
    ) {
        if accessed.is_empty() {
            return;
        }

        for fragment in &mut collection {
            if let Some(updated) = accessed.iter().find(|a| a.id == fragment.id) {
                fragment.access_count = updated.access_count;
                fragment.last_accessed_at = updated.last_accessed_at;
            }
        }

        if let Err(e) = self.write_fragments(user_id, &collection).await {
            warn!(user_id, error = %e, "failed to record memory access counts");
        }
    }

    fn cache_key(user_id: &str, fragment_type: Option<FragmentType>) -> String {
        let type_part = fragment_type.map(|t| t.as_str()).unwrap_or("all");
        format!("memory_{}_{}", user_id, type_part)
    }

    fn user_tag(user_id: &str) -> String {
        format!("user:{}", user_id)
    }
}

/// Relevance score for one fragment against a query, clamped to [0, 1]
///
/// ```text
/// score  = 0.8·[content contains query]
///        + 0.3·|{tag : tag ⊆ query or query ⊆ tag}|
/// score *= importance·0.7 + confidence·0.3
/// score *= exp(−age_days / 30)
/// ```
///
/// The per-tag bonus is deliberately uncapped before the clamp; this
/// mirrors the historical behavior consumers already rank against.
pub fn relevance_score(fragment: &MemoryFragment, query: &str, now: DateTime<Utc>) -> f64 {
    let query_lower = query.to_lowercase();
    let mut score = 0.0;

    if fragment.content.to_lowercase().contains(&query_lower) {
        score += 0.8;
    }

    for tag in &fragment.tags {
        let tag_lower = tag.to_lowercase();
        if query_lower.contains(&tag_lower) || tag_lower.contains(&query_lower) {
            score += 0.3;
        }
    }

    score *= fragment.importance * 0.7 + fragment.confidence * 0.3;

    let age_days = (now - fragment.created_at).num_milliseconds() as f64 / 86_400_000.0;
    score *= (-age_days / DECAY_DAYS).exp();

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cache::InMemoryCache;
    use crate::storage::store::MemoryStore;

    fn index() -> MemoryIndex {
        MemoryIndex::new(
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryCache::new(None)),
        )
    }

    fn fragment(content: &str, tags: &[&str]) -> MemoryFragment {
        MemoryFragment::new(
            "s1",
            "u1",
            FragmentType::Fact,
            content,
            0.9,
            0.9,
            tags.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn test_score_content_match_fresh_fragment() {
        let f = fragment("I am from Berlin", &[]);
        let score = relevance_score(&f, "berlin", Utc::now());

        // 0.8 * (0.9*0.7 + 0.9*0.3) = 0.72, with negligible decay
        assert!((score - 0.72).abs() < 0.01);
    }

    #[test]
    fn test_score_tag_bonus_applies_before_weighting() {
        let f = fragment("I work at a clinic", &["work"]);
        let score = relevance_score(&f, "work", Utc::now());

        // (0.8 + 0.3) * 0.9 = 0.99
        assert!((score - 0.99).abs() < 0.01);
    }

    #[test]
    fn test_score_clamped_to_one() {
        let f = fragment("work work work", &["work", "work-life", "workout"]);
        let score = relevance_score(&f, "work", Utc::now());
        assert!(score <= 1.0);
    }

    #[test]
    fn test_score_decays_with_age() {
        let mut f = fragment("I am from Berlin", &[]);
        f.created_at = Utc::now() - chrono::Duration::days(90);

        let score = relevance_score(&f, "berlin", Utc::now());
        // 0.72 * e^-3 ≈ 0.036
        assert!(score < 0.05);
    }

    #[test]
    fn test_score_no_match_is_zero() {
        let f = fragment("I am from Berlin", &[]);
        assert_eq!(relevance_score(&f, "madrid", Utc::now()), 0.0);
    }

    #[tokio::test]
    async fn test_remember_and_get() {
        let index = index();
        index
            .remember("u1", vec![fragment("I am from Berlin", &[])])
            .await
            .unwrap();

        let all = index.get_user_memory("u1", None).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "I am from Berlin");
    }

    #[tokio::test]
    async fn test_get_user_memory_type_filter() {
        let index = index();
        let mut pref = fragment("I like jazz", &[]);
        pref.fragment_type = FragmentType::Preference;
        index
            .remember("u1", vec![fragment("I am from Berlin", &[]), pref])
            .await
            .unwrap();

        let facts = index.get_user_memory("u1", Some(FragmentType::Fact)).await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].fragment_type, FragmentType::Fact);
    }

    #[tokio::test]
    async fn test_get_user_memory_uses_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(InMemoryCache::new(None));
        let index = MemoryIndex::new(store.clone(), cache.clone());

        index
            .remember("u1", vec![fragment("I am from Berlin", &[])])
            .await
            .unwrap();

        index.get_user_memory("u1", None).await; // populates cache
        index.get_user_memory("u1", None).await; // served from cache

        let stats = cache.stats().await;
        assert!(stats.hits >= 1);
    }

    #[tokio::test]
    async fn test_search_filters_below_threshold_and_sorts() {
        let index = index();
        let strong = fragment("I am from Berlin", &[]);
        let mut weak = fragment("I am from Berlin", &[]);
        weak.created_at = Utc::now() - chrono::Duration::days(365);
        let mut boosted = fragment("berlin is where I work", &["berlin"]);
        boosted.importance = 1.0;
        boosted.confidence = 1.0;

        index
            .remember("u1", vec![strong, weak, boosted])
            .await
            .unwrap();

        let results = index.search_memory("u1", "berlin", None).await;

        // The year-old fragment decays far below the threshold
        assert_eq!(results.len(), 2);
        let scores: Vec<f64> = results
            .iter()
            .map(|f| relevance_score(f, "berlin", Utc::now()))
            .collect();
        assert!(scores[0] >= scores[1]);
    }

    #[tokio::test]
    async fn test_search_limit() {
        let index = index();
        let fragments: Vec<MemoryFragment> =
            (0..5).map(|_| fragment("I am from Berlin", &[])).collect();
        index.remember("u1", fragments).await.unwrap();

        let results = index.search_memory("u1", "berlin", Some(2)).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_search_bumps_access_count() {
        let index = index();
        index
            .remember("u1", vec![fragment("I am from Berlin", &[])])
            .await
            .unwrap();

        let results = index.search_memory("u1", "berlin", None).await;
        assert_eq!(results[0].access_count, 1);

        // Bump persisted through the store write-back
        let reloaded = index.get_user_memory("u1", None).await;
        assert_eq!(reloaded[0].access_count, 1);

        index.search_memory("u1", "berlin", None).await;
        let reloaded = index.get_user_memory("u1", None).await;
        assert_eq!(reloaded[0].access_count, 2);
    }

    #[tokio::test]
    async fn test_memory_stats() {
        let index = index();
        let mut pref = fragment("I like jazz", &[]);
        pref.fragment_type = FragmentType::Preference;
        pref.importance = 0.7;
        index
            .remember("u1", vec![fragment("I am from Berlin", &[]), pref])
            .await
            .unwrap();

        let stats = index.memory_stats("u1").await;
        assert_eq!(stats.total_fragments, 2);
        assert_eq!(stats.fragments_by_type.get("fact"), Some(&1));
        assert_eq!(stats.fragments_by_type.get("preference"), Some(&1));
        assert!((stats.average_importance - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_purge_user_memory() {
        let index = index();
        index
            .remember("u1", vec![fragment("I am from Berlin", &[])])
            .await
            .unwrap();

        index.purge_user_memory("u1").await.unwrap();
        assert!(index.get_user_memory("u1", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_memory_treated_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(&memory_key("u1"), serde_json::json!("not a fragment list"))
            .await
            .unwrap();

        let index = MemoryIndex::new(store, Arc::new(InMemoryCache::new(None)));
        assert!(index.get_user_memory("u1", None).await.is_empty());
    }
}
