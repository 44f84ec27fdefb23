//! The cache service: Cache-API-shaped operations over the entry store.
//!
//! `HttpCache` is the only component that performs I/O (through the injected
//! [`Fetch`] capability) or mutates the store. The policy and match engines
//! stay pure; the store stays synchronous; every suspension point is a fetch.

mod revalidate;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::config::CacheConfig;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::http::{Request, Response};
use crate::matching::{self, MatchOptions};
use crate::policy;
use crate::store::{CacheEntry, EntryStore};

/// A single HTTP response cache instance.
///
/// All mutating operations serialize on one writer lock; concurrent
/// revalidations of the same key are last-writer-wins.
pub struct HttpCache {
    store: RwLock<EntryStore>,
    fetcher: Arc<dyn Fetch>,
}

impl HttpCache {
    /// Create a cache with the given configuration and fetch capability.
    pub fn new(config: &CacheConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            store: RwLock::new(EntryStore::new(config.capacity, config.ttl())),
            fetcher,
        }
    }

    /// Store a response for a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStorable`] when the response fails the storability
    /// rules; the store is left unchanged.
    pub async fn put(&self, request: Request, response: Response) -> Result<(), Error> {
        policy::evaluate_storability(&request, &response)?;

        let key = request.url().to_string();
        let entry = CacheEntry::from_parts(key.clone(), request, response);

        let mut store = self.store.write().await;
        store.insert(entry);
        tracing::debug!(key = %key, "stored response");
        Ok(())
    }

    /// First matching response, if any (Cache-API `match`).
    pub async fn match_one(&self, query: &Request, options: MatchOptions) -> Result<Option<Response>, Error> {
        Ok(self.match_all(Some(query), options).await?.into_iter().next())
    }

    /// All matching responses in insertion order (Cache-API `matchAll`).
    ///
    /// Stale hits are revalidated synchronously before being returned; a
    /// failed revalidation fetch falls back to the stale copy and is never
    /// surfaced here. Each returned response owns an independent body.
    pub async fn match_all(&self, query: Option<&Request>, options: MatchOptions) -> Result<Vec<Response>, Error> {
        let matched: Vec<CacheEntry> = {
            let mut store = self.store.write().await;
            let keys: Vec<String> = matching::select(query, options, store.entries())
                .into_iter()
                .map(|entry| entry.key.clone())
                .collect();
            // `get` promotes each hit to most-recently-used.
            keys.iter().filter_map(|key| store.get(key).cloned()).collect()
        };

        let now = Utc::now();
        let mut responses = Vec::with_capacity(matched.len());
        for entry in matched {
            if entry.policy.is_fresh(now) {
                tracing::debug!(key = %entry.key, "fresh hit");
                responses.push(entry.response_copy());
            } else {
                responses.push(revalidate::revalidate(&self.store, self.fetcher.as_ref(), entry).await);
            }
        }
        Ok(responses)
    }

    /// Remove all entries matching the query. Returns whether any entry was
    /// removed; absent keys are not an error.
    pub async fn delete(&self, query: &Request, options: MatchOptions) -> bool {
        let mut store = self.store.write().await;
        let keys: Vec<String> = matching::select(Some(query), options, store.entries())
            .into_iter()
            .map(|entry| entry.key.clone())
            .collect();

        let mut removed = false;
        for key in keys {
            removed |= store.remove(&key);
        }
        removed
    }

    /// Requests of all matching entries, in insertion order.
    pub async fn keys(&self, query: Option<&Request>, options: MatchOptions) -> Vec<Request> {
        let mut store = self.store.write().await;
        matching::select(query, options, store.entries())
            .into_iter()
            .map(|entry| entry.request.clone())
            .collect()
    }

    /// Fetch a request upstream and store the response.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] for non-GET requests, [`Error::FetchNotOk`]
    /// for non-success (or 206) upstream statuses, [`Error::FetchFailed`] for
    /// transport failures, [`Error::NotStorable`] when the response cannot be
    /// stored.
    pub async fn add(&self, request: Request) -> Result<(), Error> {
        require_get(&request)?;
        let response = self.fetcher.fetch(&request).await?;
        require_ok(&request, &response)?;
        self.put(request, response).await
    }

    /// Fetch and store every request, issuing the fetches concurrently.
    ///
    /// Stores land in fetch-completion order; the first failure fails the
    /// whole call, keeping entries already stored (no rollback). Two batch
    /// requests sharing a URL resolve last-writer-wins.
    pub async fn add_all(&self, requests: Vec<Request>) -> Result<(), Error> {
        for request in &requests {
            require_get(request)?;
        }

        let mut fetches = JoinSet::new();
        for request in requests {
            let fetcher = Arc::clone(&self.fetcher);
            fetches.spawn(async move {
                let result = fetcher.fetch(&request).await;
                (request, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let (request, result) = joined.map_err(|e| Error::FetchFailed(format!("fetch task failed: {e}")))?;
            let response = result?;
            require_ok(&request, &response)?;
            self.put(request, response).await?;
        }

        Ok(())
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

fn require_get(request: &Request) -> Result<(), Error> {
    if request.method() != http::Method::GET {
        return Err(Error::InvalidRequest(format!(
            "add requires GET, got {}",
            request.method()
        )));
    }
    Ok(())
}

fn require_ok(request: &Request, response: &Response) -> Result<(), Error> {
    let status = response.status();
    if !status.is_success() || status == http::StatusCode::PARTIAL_CONTENT {
        return Err(Error::FetchNotOk {
            url: request.url().to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorabilityViolation;
    use crate::http::Body;
    use async_trait::async_trait;
    use http::header::{HeaderMap, HeaderName, HeaderValue};
    use http::{Method, StatusCode};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn response(status: StatusCode, header_pairs: &[(&str, &str)], body: &str) -> Response {
        Response::new(status, headers(header_pairs), Body::from(body))
    }

    /// Scripted fetcher: pops canned results in order and records every
    /// request it sees.
    struct MockFetcher {
        canned: Mutex<VecDeque<Result<Response, Error>>>,
        seen: Mutex<Vec<Request>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new(canned: Vec<Result<Response, Error>>) -> Arc<Self> {
            Arc::new(Self {
                canned: Mutex::new(canned.into()),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen(&self) -> Vec<Request> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for MockFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            self.canned
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::FetchFailed("mock fetcher exhausted".into())))
        }
    }

    fn cache_with(fetcher: Arc<MockFetcher>) -> HttpCache {
        HttpCache::new(&CacheConfig::default(), fetcher)
    }

    fn cache_with_fetcher(fetcher: Arc<dyn Fetch>) -> HttpCache {
        HttpCache::new(&CacheConfig::default(), fetcher)
    }

    #[tokio::test]
    async fn test_put_rejects_no_store_and_leaves_store_unchanged() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let request = Request::get("https://example.com/").unwrap();
        let result = cache
            .put(request, response(StatusCode::OK, &[("cache-control", "no-store")], "x"))
            .await;
        assert!(matches!(
            result,
            Err(Error::NotStorable(StorabilityViolation::NoStore))
        ));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_put_rejects_partial_content_and_vary_wildcard() {
        let cache = cache_with(MockFetcher::new(vec![]));

        let request = Request::get("https://example.com/").unwrap();
        let partial = response(StatusCode::PARTIAL_CONTENT, &[], "x");
        assert!(matches!(
            cache.put(request.clone(), partial).await,
            Err(Error::NotStorable(StorabilityViolation::PartialContent))
        ));

        let wildcard = response(StatusCode::OK, &[("vary", "*")], "x");
        assert!(matches!(
            cache.put(request, wildcard).await,
            Err(Error::NotStorable(StorabilityViolation::VaryWildcard))
        ));

        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_fresh_round_trip_makes_no_fetch() {
        let fetcher = MockFetcher::new(vec![]);
        let cache = cache_with(Arc::clone(&fetcher));
        let request = Request::get("https://example.com/foo").unwrap();

        cache
            .put(
                request.clone(),
                response(StatusCode::OK, &[("cache-control", "max-age=604800")], "Hello world!"),
            )
            .await
            .unwrap();

        let mut hit = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .expect("fresh entry should match");
        assert_eq!(hit.text().unwrap(), "Hello world!");
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_match_miss_resolves_to_none() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let query = Request::get("https://example.com/not-present").unwrap();
        let result = cache.match_one(&query, MatchOptions::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_stale_hit_revalidates_once_with_conditional_headers() {
        let fetcher = MockFetcher::new(vec![Ok(response(
            StatusCode::NOT_MODIFIED,
            &[("cache-control", "max-age=3600")],
            "",
        ))]);
        let cache = cache_with(Arc::clone(&fetcher));
        let request = Request::get("https://example.com/doc").unwrap();

        cache
            .put(
                request.clone(),
                response(
                    StatusCode::OK,
                    &[("cache-control", "max-age=0"), ("etag", "\"v1\"")],
                    "original body",
                ),
            )
            .await
            .unwrap();

        let mut hit = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .expect("stale entry should still match");

        assert_eq!(fetcher.calls(), 1);
        let conditional = &fetcher.seen()[0];
        assert_eq!(conditional.header("if-none-match"), Some("\"v1\""));
        assert_eq!(hit.text().unwrap(), "original body");

        // Lifetime was refreshed from the 304 headers: the next match is a
        // fresh hit with no further fetch.
        let mut again = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(again.text().unwrap(), "original body");
    }

    #[tokio::test]
    async fn test_stale_hit_without_validator_does_full_fetch() {
        let fetcher = MockFetcher::new(vec![Ok(response(
            StatusCode::OK,
            &[("cache-control", "max-age=60")],
            "replacement",
        ))]);
        let cache = cache_with(Arc::clone(&fetcher));
        let request = Request::get("https://example.com/doc").unwrap();

        cache
            .put(request.clone(), response(StatusCode::OK, &[], "original"))
            .await
            .unwrap();

        let mut hit = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.text().unwrap(), "replacement");
        assert_eq!(fetcher.calls(), 1);
        let sent = &fetcher.seen()[0];
        assert!(sent.header("if-none-match").is_none());
        assert!(sent.header("if-modified-since").is_none());
    }

    #[tokio::test]
    async fn test_failed_revalidation_serves_stale() {
        let fetcher = MockFetcher::new(vec![Err(Error::FetchFailed("connection refused".into()))]);
        let cache = cache_with(Arc::clone(&fetcher));
        let request = Request::get("https://example.com/doc").unwrap();

        cache
            .put(
                request.clone(),
                response(StatusCode::OK, &[("etag", "\"v1\"")], "stale but served"),
            )
            .await
            .unwrap();

        let mut hit = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .expect("fetch failure must not surface from match");
        assert_eq!(hit.text().unwrap(), "stale but served");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_vary_discrimination_through_service() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let stored_request = Request::new(
            Method::GET,
            "https://example.com/",
            headers(&[("cookie", "A")]),
        )
        .unwrap();

        cache
            .put(
                stored_request,
                response(
                    StatusCode::OK,
                    &[("cache-control", "max-age=60"), ("vary", "Cookie")],
                    "for A",
                ),
            )
            .await
            .unwrap();

        let other_cookie = Request::new(
            Method::GET,
            "https://example.com/",
            headers(&[("cookie", "B")]),
        )
        .unwrap();

        assert!(
            cache
                .match_one(&other_cookie, MatchOptions::default())
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            cache
                .match_one(&other_cookie, MatchOptions { ignore_vary: true, ..Default::default() })
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_match_options_for_method_and_search() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let request = Request::get("https://example.com/?foo=bar").unwrap();
        cache
            .put(
                request,
                response(StatusCode::OK, &[("cache-control", "max-age=60")], "x"),
            )
            .await
            .unwrap();

        let head = Request::new(Method::HEAD, "https://example.com/?foo=bar", HeaderMap::new()).unwrap();
        assert!(cache.match_one(&head, MatchOptions::default()).await.unwrap().is_none());
        assert!(
            cache
                .match_one(&head, MatchOptions { ignore_method: true, ..Default::default() })
                .await
                .unwrap()
                .is_some()
        );

        let no_search = Request::get("https://example.com/").unwrap();
        assert!(
            cache
                .match_one(&no_search, MatchOptions::default())
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            cache
                .match_one(&no_search, MatchOptions { ignore_search: true, ..Default::default() })
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let request = Request::get("https://example.com/").unwrap();

        assert!(!cache.delete(&request, MatchOptions::default()).await);

        cache
            .put(
                request.clone(),
                response(StatusCode::OK, &[("cache-control", "max-age=60")], "x"),
            )
            .await
            .unwrap();

        assert!(cache.delete(&request, MatchOptions::default()).await);
        assert!(!cache.delete(&request, MatchOptions::default()).await);
    }

    #[tokio::test]
    async fn test_keys_preserve_insertion_order() {
        let cache = cache_with(MockFetcher::new(vec![]));
        for url in ["https://example.com/b", "https://example.com/a"] {
            cache
                .put(
                    Request::get(url).unwrap(),
                    response(StatusCode::OK, &[("cache-control", "max-age=60")], "x"),
                )
                .await
                .unwrap();
        }

        let keys = cache.keys(None, MatchOptions::default()).await;
        let urls: Vec<_> = keys.iter().map(|r| r.url().as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/b", "https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_add_fetches_and_stores() {
        let fetcher = MockFetcher::new(vec![Ok(response(
            StatusCode::OK,
            &[("cache-control", "max-age=604800")],
            "fetched",
        ))]);
        let cache = cache_with(Arc::clone(&fetcher));
        let request = Request::get("https://example.com/").unwrap();

        cache.add(request.clone()).await.unwrap();
        assert_eq!(cache.len().await, 1);

        let mut hit = cache
            .match_one(&request, MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.text().unwrap(), "fetched");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_non_get() {
        let cache = cache_with(MockFetcher::new(vec![]));
        let request = Request::new(Method::POST, "https://example.com/", HeaderMap::new()).unwrap();
        assert!(matches!(cache.add(request).await, Err(Error::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_add_fails_on_error_status() {
        let fetcher = MockFetcher::new(vec![Ok(response(StatusCode::INTERNAL_SERVER_ERROR, &[], ""))]);
        let cache = cache_with(fetcher);
        let request = Request::get("https://example.com/broken").unwrap();
        assert!(matches!(
            cache.add(request).await,
            Err(Error::FetchNotOk { status: 500, .. })
        ));
        assert!(cache.is_empty().await);
    }

    /// Serves canned responses by URL path; `/broken` fails slowly so that
    /// successes in the same batch land first.
    struct KeyedFetcher;

    #[async_trait]
    impl Fetch for KeyedFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            match request.url().path() {
                "/one" => Ok(response(StatusCode::OK, &[("cache-control", "max-age=60")], "one")),
                "/two" => Ok(response(StatusCode::OK, &[("cache-control", "max-age=60")], "two")),
                _ => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Err(Error::FetchFailed("boom".into()))
                }
            }
        }
    }

    #[tokio::test]
    async fn test_add_all_stores_every_request() {
        let cache = cache_with_fetcher(Arc::new(KeyedFetcher));
        cache
            .add_all(vec![
                Request::get("https://example.com/one").unwrap(),
                Request::get("https://example.com/two").unwrap(),
            ])
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        let mut two = cache
            .match_one(&Request::get("https://example.com/two").unwrap(), MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(two.text().unwrap(), "two");
    }

    #[tokio::test]
    async fn test_add_all_failure_keeps_earlier_entries() {
        let cache = cache_with_fetcher(Arc::new(KeyedFetcher));

        let result = cache
            .add_all(vec![
                Request::get("https://example.com/one").unwrap(),
                Request::get("https://example.com/broken").unwrap(),
            ])
            .await;

        assert!(matches!(result, Err(Error::FetchFailed(_))));
        // The successful put that completed before the failure survives.
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_eviction_through_service() {
        let fetcher = MockFetcher::new(vec![]);
        let config = CacheConfig { capacity: 2, ..Default::default() };
        let cache = HttpCache::new(&config, fetcher);

        for url in [
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
        ] {
            cache
                .put(
                    Request::get(url).unwrap(),
                    response(StatusCode::OK, &[("cache-control", "max-age=60")], "x"),
                )
                .await
                .unwrap();
        }

        assert_eq!(cache.len().await, 2);
        let first = Request::get("https://example.com/1").unwrap();
        assert!(cache.match_one(&first, MatchOptions::default()).await.unwrap().is_none());
    }
}
