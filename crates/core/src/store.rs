//! Bounded entry store with LRU eviction and lazy hard-TTL expiry.
//!
//! Keyed by canonical URL: at most one entry per URL, a re-insert for an
//! existing key always replaces. Method and Vary discrimination happen in the
//! match engine, not here. All operations are synchronous; the cache service
//! serializes access behind a single lock.
//!
//! The hard TTL is a store-capacity safeguard, distinct from HTTP freshness:
//! an entry past the TTL is dropped at lookup no matter what its headers say.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};

use crate::http::{Body, Request, Response};
use crate::policy::FreshnessState;

/// Response parts as owned by the store (body materialized to `Bytes`).
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Independent response copy with a fresh, unread body handle.
    pub fn to_response(&self) -> Response {
        Response::received_at(
            self.status,
            self.headers.clone(),
            Body::from_bytes(self.body.clone()),
            self.received_at,
        )
    }
}

/// A stored request/response pair plus its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Canonical URL, the store key.
    pub key: String,
    pub request: Request,
    pub response: StoredResponse,
    pub policy: FreshnessState,
}

impl CacheEntry {
    /// Consume a response into a store-owned entry, computing its freshness
    /// state from the response headers. Callers check storability first.
    pub fn from_parts(key: String, request: Request, mut response: Response) -> Self {
        let policy = FreshnessState::from_response(response.headers(), response.capture_time());
        let stored = StoredResponse {
            status: response.status(),
            headers: response.headers().clone(),
            received_at: response.capture_time(),
            body: response.read_body().unwrap_or_default(),
        };
        Self { key, request, response: stored, policy }
    }

    pub fn response_copy(&self) -> Response {
        self.response.to_response()
    }
}

struct Slot {
    entry: CacheEntry,
    /// Monotonic insertion sequence; kept across in-place replacement so
    /// iteration order stays stable.
    inserted: u64,
    /// Recency tick, bumped by `get` and `insert`.
    last_used: u64,
    /// Wall-clock insertion time for the hard TTL.
    stored_at: Instant,
}

/// Capacity-bounded URL → entry map.
pub struct EntryStore {
    slots: HashMap<String, Slot>,
    capacity: usize,
    ttl: Option<Duration>,
    clock: u64,
}

impl EntryStore {
    /// Create a store holding at most `capacity` entries, each dropped
    /// `ttl` after insertion when a TTL is configured.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        assert!(capacity > 0, "store capacity must be at least 1");
        Self { slots: HashMap::with_capacity(capacity), capacity, ttl, clock: 0 }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn purge_expired(&mut self) {
        let Some(ttl) = self.ttl else { return };
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.stored_at.elapsed() <= ttl);
        let dropped = before - self.slots.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped entries past hard TTL");
        }
    }

    /// Look up an entry, promoting it to most-recently-used. Entries past the
    /// hard TTL are removed instead of returned.
    pub fn get(&mut self, key: &str) -> Option<&CacheEntry> {
        if let Some(ttl) = self.ttl {
            let expired = self.slots.get(key).is_some_and(|slot| slot.stored_at.elapsed() > ttl);
            if expired {
                self.slots.remove(key);
                tracing::debug!(key, "dropped entry past hard TTL");
                return None;
            }
        }

        let tick = self.tick();
        let slot = self.slots.get_mut(key)?;
        slot.last_used = tick;
        Some(&slot.entry)
    }

    /// Insert or replace the entry for its key, evicting the least-recently
    /// used entry while over capacity. Replacement keeps the key's original
    /// insertion position.
    pub fn insert(&mut self, entry: CacheEntry) {
        let tick = self.tick();

        if let Some(slot) = self.slots.get_mut(&entry.key) {
            slot.entry = entry;
            slot.last_used = tick;
            slot.stored_at = Instant::now();
            return;
        }

        self.slots.insert(
            entry.key.clone(),
            Slot { entry, inserted: tick, last_used: tick, stored_at: Instant::now() },
        );

        while self.slots.len() > self.capacity {
            self.evict_lru();
        }
    }

    fn evict_lru(&mut self) {
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.slots.remove(&key);
            tracing::debug!(key = %key, "evicted least-recently-used entry");
        }
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Keys in insertion order.
    pub fn keys(&mut self) -> Vec<String> {
        self.purge_expired();
        let mut slots: Vec<_> = self.slots.values().collect();
        slots.sort_by_key(|slot| slot.inserted);
        slots.iter().map(|slot| slot.entry.key.clone()).collect()
    }

    /// Borrowed views of all live entries, in insertion order.
    pub fn entries(&mut self) -> Vec<&CacheEntry> {
        self.purge_expired();
        let mut slots: Vec<_> = self.slots.values().collect();
        slots.sort_by_key(|slot| slot.inserted);
        slots.into_iter().map(|slot| &slot.entry).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> CacheEntry {
        let request = Request::get(url).unwrap();
        let response = Response::new(StatusCode::OK, HeaderMap::new(), Body::from("body"));
        CacheEntry::from_parts(request.url().to_string(), request, response)
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/a"));
        assert_eq!(store.len(), 1);
        let found = store.get("https://example.com/a").unwrap();
        assert_eq!(found.response.body, bytes::Bytes::from_static(b"body"));
        assert!(store.get("https://example.com/missing").is_none());
    }

    #[test]
    fn test_replace_keeps_single_entry_per_url() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/a"));
        store.insert(entry("https://example.com/a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let mut store = EntryStore::new(3, None);
        store.insert(entry("https://example.com/1"));
        store.insert(entry("https://example.com/2"));
        store.insert(entry("https://example.com/3"));

        // Touch #1 so #2 becomes the LRU victim.
        store.get("https://example.com/1");
        store.insert(entry("https://example.com/4"));

        assert_eq!(store.len(), 3);
        assert!(store.get("https://example.com/1").is_some());
        assert!(store.get("https://example.com/2").is_none());
        assert!(store.get("https://example.com/3").is_some());
        assert!(store.get("https://example.com/4").is_some());
    }

    #[test]
    fn test_overflow_evicts_exactly_one() {
        let mut store = EntryStore::new(2, None);
        store.insert(entry("https://example.com/1"));
        store.insert(entry("https://example.com/2"));
        store.insert(entry("https://example.com/3"));
        assert_eq!(store.len(), 2);
        assert!(store.get("https://example.com/1").is_none());
    }

    #[test]
    fn test_keys_in_insertion_order() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/b"));
        store.insert(entry("https://example.com/a"));
        store.insert(entry("https://example.com/c"));
        // Touching an entry must not disturb iteration order.
        store.get("https://example.com/a");
        assert_eq!(
            store.keys(),
            vec![
                "https://example.com/b",
                "https://example.com/a",
                "https://example.com/c"
            ]
        );
    }

    #[test]
    fn test_replacement_keeps_insertion_position() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/b"));
        store.insert(entry("https://example.com/a"));
        store.insert(entry("https://example.com/b"));
        assert_eq!(store.keys(), vec!["https://example.com/b", "https://example.com/a"]);
    }

    #[test]
    fn test_hard_ttl_expires_lazily() {
        let mut store = EntryStore::new(4, Some(Duration::ZERO));
        store.insert(entry("https://example.com/a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("https://example.com/a").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/a"));
        assert!(store.remove("https://example.com/a"));
        assert!(!store.remove("https://example.com/a"));
    }

    #[test]
    fn test_response_copies_are_independent() {
        let mut store = EntryStore::new(4, None);
        store.insert(entry("https://example.com/a"));
        let entry = store.get("https://example.com/a").unwrap();
        let mut first = entry.response_copy();
        let mut second = entry.response_copy();
        assert_eq!(first.text().unwrap(), "body");
        assert_eq!(second.text().unwrap(), "body");
    }
}
