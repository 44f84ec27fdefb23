//! Freshness and revalidation policy engine.
//!
//! Pure computation over request/response descriptors: whether a response may
//! be stored, how long it stays fresh, what conditional headers revalidate it
//! cheaply, and how a revalidation result folds back into a stored entry.
//! Nothing here touches the store or the network.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::error::StorabilityViolation;
use crate::http::{Request, Response, date};

/// Ceiling for the Last-Modified heuristic lifetime (10% of the time since
/// modification, but never more than a day).
const HEURISTIC_LIFETIME_CAP: Duration = Duration::from_secs(24 * 60 * 60);

/// Response `Cache-Control` directives this cache acts on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheControl {
    pub no_store: bool,
    pub no_cache: bool,
    pub must_revalidate: bool,
    pub max_age: Option<u64>,
    pub s_maxage: Option<u64>,
}

impl CacheControl {
    /// Parse all `Cache-Control` header values. Unknown directives are
    /// ignored; an unparsable argument reads as the directive being absent.
    pub fn parse(headers: &HeaderMap) -> Self {
        let mut cc = Self::default();

        let values = headers
            .get_all(header::CACHE_CONTROL)
            .iter()
            .filter_map(|v| v.to_str().ok());

        for value in values {
            for directive in value.split(',') {
                let directive = directive.trim();
                let (name, arg) = match directive.split_once('=') {
                    Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
                    None => (directive, None),
                };
                match name.to_ascii_lowercase().as_str() {
                    "no-store" => cc.no_store = true,
                    "no-cache" => cc.no_cache = true,
                    "must-revalidate" => cc.must_revalidate = true,
                    "max-age" => cc.max_age = arg.and_then(|a| a.parse().ok()),
                    "s-maxage" => cc.s_maxage = arg.and_then(|a| a.parse().ok()),
                    _ => {}
                }
            }
        }

        cc
    }
}

/// Per-entry freshness bookkeeping, computed once per stored response and
/// recomputed whenever the response is replaced (never patched in place).
#[derive(Debug, Clone)]
pub struct FreshnessState {
    /// How long the response counts as fresh from `stored_at`.
    pub freshness_lifetime: Duration,
    /// When the response was captured.
    pub stored_at: DateTime<Utc>,
    /// Lowercased header names from the response `Vary` header.
    pub vary: Vec<String>,
    /// `ETag` validator, verbatim.
    pub etag: Option<String>,
    /// `Last-Modified` validator, verbatim header value.
    pub last_modified: Option<String>,
    /// `no-cache`/`must-revalidate` was set: every hit revalidates.
    always_revalidate: bool,
}

impl FreshnessState {
    /// Compute the freshness state for a response captured at `received_at`.
    pub fn from_response(headers: &HeaderMap, received_at: DateTime<Utc>) -> Self {
        let cc = CacheControl::parse(headers);

        Self {
            freshness_lifetime: freshness_lifetime(headers, &cc, received_at),
            stored_at: received_at,
            vary: parse_vary(headers),
            etag: header_string(headers, header::ETAG),
            last_modified: header_string(headers, header::LAST_MODIFIED),
            always_revalidate: cc.no_cache || cc.must_revalidate,
        }
    }

    /// Is the stored response still fresh at `now`?
    ///
    /// `no-cache`/`must-revalidate` force staleness regardless of lifetime.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.always_revalidate {
            return false;
        }
        let elapsed = (now - self.stored_at).to_std().unwrap_or(Duration::ZERO);
        elapsed < self.freshness_lifetime
    }

    pub fn has_validator(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }

    /// Conditional headers for a revalidation fetch. Empty when no validator
    /// exists, in which case the caller must do a full fetch.
    pub fn revalidation_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(etag) = &self.etag
            && let Ok(value) = HeaderValue::from_str(etag)
        {
            headers.insert(header::IF_NONE_MATCH, value);
        }

        if let Some(last_modified) = &self.last_modified
            && let Ok(value) = HeaderValue::from_str(last_modified)
        {
            headers.insert(header::IF_MODIFIED_SINCE, value);
        }

        headers
    }
}

/// Decide whether a (request, response) pair may enter the store.
pub fn evaluate_storability(request: &Request, response: &Response) -> Result<(), StorabilityViolation> {
    let status = response.status();

    if status == StatusCode::PARTIAL_CONTENT {
        return Err(StorabilityViolation::PartialContent);
    }
    if !status.is_success() {
        return Err(StorabilityViolation::ErrorStatus(status.as_u16()));
    }
    if request.method() != Method::GET {
        return Err(StorabilityViolation::NonGetMethod(request.method().to_string()));
    }
    if CacheControl::parse(response.headers()).no_store {
        return Err(StorabilityViolation::NoStore);
    }
    if parse_vary(response.headers()).iter().any(|name| name == "*") {
        return Err(StorabilityViolation::VaryWildcard);
    }
    if response.body().is_consumed() {
        return Err(StorabilityViolation::BodyConsumed);
    }

    Ok(())
}

/// Freshness lifetime of a response, in priority order: `s-maxage`,
/// `max-age`, `Expires - Date`, the Last-Modified heuristic, zero. Any `Age`
/// the response arrived with is subtracted up front.
pub fn freshness_lifetime(headers: &HeaderMap, cc: &CacheControl, received_at: DateTime<Utc>) -> Duration {
    let lifetime = raw_lifetime(headers, cc, received_at);

    let age = headers
        .get(header::AGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(Duration::ZERO, Duration::from_secs);

    lifetime.saturating_sub(age)
}

fn raw_lifetime(headers: &HeaderMap, cc: &CacheControl, received_at: DateTime<Utc>) -> Duration {
    // One shared store, so s-maxage and max-age are equivalent in strength;
    // s-maxage still wins the priority order.
    if let Some(secs) = cc.s_maxage.or(cc.max_age) {
        return Duration::from_secs(secs);
    }

    // Expires is relative to the origin's Date, falling back to our own
    // capture time when Date is missing or malformed.
    if let Some(expires) = header_date(headers, header::EXPIRES) {
        let origin_now = header_date(headers, header::DATE).unwrap_or(received_at);
        return (expires - origin_now).to_std().unwrap_or(Duration::ZERO);
    }

    if let Some(last_modified) = header_date(headers, header::LAST_MODIFIED) {
        let origin_now = header_date(headers, header::DATE).unwrap_or(received_at);
        if let Ok(since_modified) = (origin_now - last_modified).to_std() {
            return (since_modified / 10).min(HEURISTIC_LIFETIME_CAP);
        }
    }

    Duration::ZERO
}

/// Result of folding a revalidation response into a stored one.
#[derive(Debug)]
pub struct Merged {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
    /// False when the stored body was revalidated (304), true when the
    /// upstream sent a replacement.
    pub modified: bool,
}

/// Merge a revalidation response into the stored response parts.
///
/// A 304 keeps the stored body and merges headers: new values override stored
/// ones, except body-describing headers which stay as stored. Anything else
/// replaces the entry wholesale. Callers recompute [`FreshnessState`] from
/// the merged headers; it is never patched.
pub fn merge_revalidation(
    stored_status: StatusCode,
    stored_headers: &HeaderMap,
    stored_body: &Bytes,
    mut new: Response,
) -> Merged {
    if new.status() == StatusCode::NOT_MODIFIED {
        let mut headers = stored_headers.clone();
        for name in new.headers().keys() {
            if describes_body(name) {
                continue;
            }
            headers.remove(name);
            for value in new.headers().get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }
        return Merged {
            status: stored_status,
            headers,
            body: stored_body.clone(),
            received_at: new.capture_time(),
            modified: false,
        };
    }

    Merged {
        status: new.status(),
        headers: new.headers().clone(),
        received_at: new.capture_time(),
        body: new.read_body().unwrap_or_default(),
        modified: true,
    }
}

/// Headers a 304 must not overwrite: they describe the stored body, which the
/// 304 by definition did not carry.
fn describes_body(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "content-length" | "content-encoding" | "transfer-encoding" | "content-range"
    )
}

/// Header names listed in `Vary`, lowercased, across all `Vary` values.
pub fn parse_vary(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn header_date(headers: &HeaderMap, name: HeaderName) -> Option<DateTime<Utc>> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(date::parse_http_date)
}
