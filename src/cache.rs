//! Time-bounded memo of successful fallback searches

use crate::types::SearchResult;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache lookups are exact on both the query text and the requested size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub max_results: u32,
}

impl CacheKey {
    pub fn new(query: &str, max_results: u32) -> Self {
        Self {
            query: query.to_string(),
            max_results,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub results: Vec<SearchResult>,
    /// Provider that produced the results
    pub provider: String,
    pub stored_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Mutex-guarded map; a TTL of zero disables caching
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Live entry for `key`. Expired entries are evicted on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        match entries.get(key) {
            Some(entry) if entry.is_live(self.ttl) => Some(entry.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, results: Vec<SearchResult>, provider: &str) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(
                key,
                CacheEntry {
                    results,
                    provider: provider.to_string(),
                    stored_at: Instant::now(),
                },
            );
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many went
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(self.ttl));
        before - entries.len()
    }
}
