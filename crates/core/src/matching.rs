//! Cache-API request matching.
//!
//! Pure functions deciding which stored entries satisfy a query request under
//! caller-supplied options. Ordering is load-bearing: `select` preserves the
//! store's insertion order because `match` returns the first element.

use crate::http::{Request, joined_header};
use crate::store::CacheEntry;

/// Per-query matching options. All default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Ignore the URL query string when comparing.
    pub ignore_search: bool,
    /// Ignore the request method (normally only GET entries match GET queries).
    pub ignore_method: bool,
    /// Skip Vary header discrimination.
    pub ignore_vary: bool,
}

/// URL string used for comparison. Fragments are gone since construction;
/// `ignore_search` drops the query for the comparison only, never for the
/// stored key.
pub fn match_key(url: &url::Url, ignore_search: bool) -> String {
    if ignore_search && url.query().is_some() {
        let mut stripped = url.clone();
        stripped.set_query(None);
        stripped.to_string()
    } else {
        url.to_string()
    }
}

/// Does `entry` satisfy `query` under `options`?
pub fn request_matches(query: &Request, options: MatchOptions, entry: &CacheEntry) -> bool {
    if match_key(query.url(), options.ignore_search) != match_key(entry.request.url(), options.ignore_search) {
        return false;
    }

    if !options.ignore_method && query.method() != entry.request.method() {
        return false;
    }

    if !options.ignore_vary {
        for name in &entry.policy.vary {
            // A stored Vary: * can never match; storage already rejects it,
            // this is the matching-side half of the same rule.
            if name == "*" {
                return false;
            }
            let stored = joined_header(entry.request.headers(), name);
            let queried = joined_header(query.headers(), name);
            if stored != queried {
                return false;
            }
        }
    }

    true
}

/// Filter `entries` down to those matching `query`, keeping their order.
/// Without a query, every entry matches.
pub fn select<'a, I>(query: Option<&Request>, options: MatchOptions, entries: I) -> Vec<&'a CacheEntry>
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    match query {
        None => entries.into_iter().collect(),
        Some(query) => entries
            .into_iter()
            .filter(|entry| request_matches(query, options, entry))
            .collect(),
    }
}
