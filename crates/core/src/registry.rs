//! Named-cache registry.
//!
//! Maps string names to independent [`HttpCache`] instances, mirroring the
//! `caches.open("v1")` surface. Deliberately not a process-wide singleton:
//! callers construct a `CacheStorage`, hold it, and pass it around.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::HttpCache;
use crate::config::CacheConfig;
use crate::fetch::Fetch;

/// Registry of named cache instances sharing one configuration and fetch
/// capability.
pub struct CacheStorage {
    /// Name → cache, in creation order.
    caches: RwLock<Vec<(String, Arc<HttpCache>)>>,
    config: CacheConfig,
    fetcher: Arc<dyn Fetch>,
}

impl CacheStorage {
    /// Create an empty registry. Caches opened later inherit `config` and
    /// `fetcher`.
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self { caches: RwLock::new(Vec::new()), config, fetcher }
    }

    /// Get the cache for `name`, creating it on first open.
    pub async fn open(&self, name: &str) -> Arc<HttpCache> {
        {
            let caches = self.caches.read().await;
            if let Some((_, cache)) = caches.iter().find(|(n, _)| n == name) {
                return Arc::clone(cache);
            }
        }

        let mut caches = self.caches.write().await;
        // Racing opens may both miss the read check; re-check under the
        // write lock so both callers share one instance.
        if let Some((_, cache)) = caches.iter().find(|(n, _)| n == name) {
            return Arc::clone(cache);
        }

        let cache = Arc::new(HttpCache::new(&self.config, Arc::clone(&self.fetcher)));
        caches.push((name.to_string(), Arc::clone(&cache)));
        tracing::debug!(name = %name, "opened new cache");
        cache
    }

    /// Whether a cache with this name exists.
    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.iter().any(|(n, _)| n == name)
    }

    /// Drop the named cache and its entries. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        caches.len() < before
    }

    /// Cache names in creation order.
    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.iter().map(|(n, _)| n.clone()).collect()
    }
}
