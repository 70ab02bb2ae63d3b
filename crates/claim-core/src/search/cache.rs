//! Bounded LRU cache of final query results
//!
//! Keyed by the trimmed claim and `top_k`. Only successful searches are
//! stored. The pipeline is deterministic, so a hit returns exactly what a
//! fresh search would.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::QueryResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    claim: String,
    top_k: usize,
}

pub struct QueryCache {
    entries: Option<Mutex<LruCache<CacheKey, Arc<Vec<QueryResult>>>>>,
}

impl QueryCache {
    /// A capacity of 0 yields a cache that never stores anything
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, claim: &str, top_k: usize) -> Option<Arc<Vec<QueryResult>>> {
        let entries = self.entries.as_ref()?;
        let key = CacheKey {
            claim: claim.trim().to_string(),
            top_k,
        };
        // Poisoning leaves the map consistent
        let mut guard = entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(&key).cloned()
    }

    pub fn insert(&self, claim: &str, top_k: usize, results: Arc<Vec<QueryResult>>) {
        if let Some(entries) = &self.entries {
            let key = CacheKey {
                claim: claim.trim().to_string(),
                top_k,
            };
            let mut guard = entries.lock().unwrap_or_else(|e| e.into_inner());
            guard.put(key, results);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |e| e.lock().unwrap_or_else(|e| e.into_inner()).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stance::Stance;

    fn results(id: u64) -> Arc<Vec<QueryResult>> {
        Arc::new(vec![QueryResult {
            label: Stance::Support,
            text: "text".to_string(),
            url: "url".to_string(),
            score: 1.0,
            passage_id: id,
            title: "title".to_string(),
            similarity: 1.0,
            confidence: 1.0,
        }])
    }

    #[test]
    fn test_hit_ignores_surrounding_whitespace() {
        let cache = QueryCache::new(4);
        cache.insert("  Paris is big ", 3, results(1));
        assert_eq!(cache.get("Paris is big", 3).unwrap()[0].passage_id, 1);
        assert!(cache.get("Paris is big", 4).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = QueryCache::new(2);
        cache.insert("a", 1, results(1));
        cache.insert("b", 1, results(2));
        assert!(cache.get("a", 1).is_some());
        cache.insert("c", 1, results(3));

        assert!(cache.get("b", 1).is_none());
        assert!(cache.get("a", 1).is_some());
        assert!(cache.get("c", 1).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = QueryCache::new(0);
        assert!(!cache.is_enabled());
        cache.insert("a", 1, results(1));
        assert!(cache.get("a", 1).is_none());
        assert!(cache.is_empty());
    }
}
