//! Round-robin API key rotation
//!
//! Each provider owns an ordered pool of credentials. Every call to
//! [`KeyRotationStore::get_next_key`] hands out the key under the cursor and
//! advances it by one, regardless of what happens with the request that uses
//! it. Rotation spreads quota consumption evenly across keys; it does not try
//! to route around failing keys.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Ordered credentials for one provider with a rotating cursor
#[derive(Debug, Clone)]
pub struct KeyPool {
    keys: Vec<String>,
    current_index: usize,
}

impl KeyPool {
    /// Build a pool, dropping blank keys. Returns `None` when nothing usable remains.
    pub fn new(keys: Vec<String>) -> Option<Self> {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            None
        } else {
            Some(Self {
                keys,
                current_index: 0,
            })
        }
    }

    /// Key under the cursor; the cursor moves on afterwards
    pub fn next_key(&mut self) -> &str {
        let index = self.current_index;
        self.current_index = (index + 1) % self.keys.len();
        &self.keys[index]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }
}

/// Snapshot of one pool for status reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPoolStats {
    pub total_keys: usize,
    pub current_index: usize,
}

/// Key pools for every provider, each behind its own lock
#[derive(Debug, Default)]
pub struct KeyRotationStore {
    pools: HashMap<String, Mutex<KeyPool>>,
}

impl KeyRotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pool per entry of a `provider -> keys` map
    pub fn from_keys(keys: &BTreeMap<String, Vec<String>>) -> Self {
        keys.iter().fold(Self::new(), |store, (provider, keys)| {
            store.with_keys(provider, keys.clone())
        })
    }

    /// Builder form of [`KeyRotationStore::insert`]
    pub fn with_keys(mut self, provider: &str, keys: Vec<String>) -> Self {
        self.insert(provider, keys);
        self
    }

    /// Register (or replace) the keys of a provider. Empty key lists are ignored.
    pub fn insert(&mut self, provider: &str, keys: Vec<String>) {
        let provider = normalize_provider(provider);
        match KeyPool::new(keys) {
            Some(pool) => {
                log::info!("{provider}: {} API key(s) loaded", pool.len());
                self.pools.insert(provider, Mutex::new(pool));
            }
            None => {
                log::warn!("{provider}: no API keys configured");
                self.pools.remove(&provider);
            }
        }
    }

    /// Next credential for `provider`, or `None` when it has no keys
    pub fn get_next_key(&self, provider: &str) -> Option<String> {
        let provider = normalize_provider(provider);
        let Some(pool) = self.pools.get(&provider) else {
            log::error!("No API key available for {provider}");
            return None;
        };

        let mut pool = pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let position = pool.current_index() + 1;
        let total = pool.len();
        let key = pool.next_key().to_string();
        log::debug!("{provider}: using key {position}/{total}");
        Some(key)
    }

    pub fn has_keys(&self, provider: &str) -> bool {
        self.pools.contains_key(&normalize_provider(provider))
    }

    pub fn key_count(&self, provider: &str) -> usize {
        self.pools
            .get(&normalize_provider(provider))
            .map(|pool| pool.lock().unwrap_or_else(|p| p.into_inner()).len())
            .unwrap_or(0)
    }

    /// Providers with at least one key, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> BTreeMap<String, KeyPoolStats> {
        self.pools
            .iter()
            .map(|(name, pool)| {
                let pool = pool.lock().unwrap_or_else(|p| p.into_inner());
                (
                    name.clone(),
                    KeyPoolStats {
                        total_keys: pool.len(),
                        current_index: pool.current_index(),
                    },
                )
            })
            .collect()
    }
}

fn normalize_provider(provider: &str) -> String {
    provider.trim().to_lowercase()
}
