//! Metadata cache keyed by remote path.
//!
//! Listings, searches and lookups upsert what they see; only the
//! single-document query reads from it. Entries never expire. Deleting a
//! document evicts it together with everything cached below it.
//!
//! Remote paths compare case-insensitively, so keys are lowercased.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dropdocs_remote::RemoteEntry;

fn cache_key(path: &str) -> String {
    path.to_lowercase()
}

/// Thread-safe `path -> RemoteEntry` map.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<String, RemoteEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a path, counting the hit or miss.
    pub fn get(&self, path: &str) -> Option<RemoteEntry> {
        let found = self.entries.get(&cache_key(path)).map(|e| e.value().clone());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert or replace the entry for its path.
    pub fn upsert(&self, entry: &RemoteEntry) {
        self.entries.insert(cache_key(entry.path()), entry.clone());
    }

    /// Remove `path` and every cached entry below it.
    ///
    /// Returns the number of entries removed.
    pub fn evict_tree(&self, path: &str) -> usize {
        let path = cache_key(path.trim_end_matches('/'));
        let prefix = format!("{path}/");
        let before = self.entries.len();
        self.entries
            .retain(|key, _| *key != path && !key.starts_with(&prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics for monitoring and debugging.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Cached paths
    pub entries: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through
    pub misses: u64,
}
