//! Staleness-triggered revalidation.
//!
//! Per stale hit: `Stale → (has validator?) → Revalidating → (304 |
//! other-status | fetch-error) → {Fresh(reused body) | Fresh(new body) |
//! stale-serve}`. Staleness is never a caller-visible error; only the
//! `add`/`put` paths surface fetch failures.

use tokio::sync::RwLock;

use crate::fetch::Fetch;
use crate::http::{Body, Response};
use crate::policy;
use crate::store::{CacheEntry, EntryStore};

/// Revalidate a stale entry and return the response to serve.
///
/// On success the store is updated with the merged entry and a recomputed
/// freshness lifetime. On transport failure the stale stored copy is served
/// and the store left alone. Concurrent revalidations of the same key are
/// last-writer-wins.
pub(super) async fn revalidate(
    store: &RwLock<EntryStore>,
    fetcher: &dyn Fetch,
    entry: CacheEntry,
) -> Response {
    let conditional = entry.policy.revalidation_headers();
    // No validator means no cheap conditional request; refetch in full.
    let request = if conditional.is_empty() {
        entry.request.clone()
    } else {
        entry.request.with_extra_headers(&conditional)
    };

    tracing::debug!(key = %entry.key, conditional = !conditional.is_empty(), "revalidating stale entry");

    let upstream = match fetcher.fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(key = %entry.key, error = %e, "revalidation fetch failed, serving stale response");
            return entry.response_copy();
        }
    };

    let merged = policy::merge_revalidation(
        entry.response.status,
        &entry.response.headers,
        &entry.response.body,
        upstream,
    );
    let modified = merged.modified;

    let response = Response::received_at(
        merged.status,
        merged.headers,
        Body::from_bytes(merged.body),
        merged.received_at,
    );

    // A replacement the policy refuses to store (say, a 500 that displaced a
    // 200) invalidates the entry: the upstream disavowed the stored body.
    if modified && policy::evaluate_storability(&entry.request, &response).is_err() {
        store.write().await.remove(&entry.key);
        tracing::debug!(key = %entry.key, status = response.status().as_u16(), "replacement not storable, entry dropped");
        return response;
    }

    let refreshed = CacheEntry::from_parts(entry.key.clone(), entry.request.clone(), response);
    let serve = refreshed.response_copy();
    store.write().await.insert(refreshed);
    tracing::debug!(key = %entry.key, modified, "revalidation complete");
    serve
}
