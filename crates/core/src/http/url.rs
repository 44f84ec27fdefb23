//! URL canonicalization.
//!
//! Every URL that enters the cache — as a store key or as a query — goes
//! through [`canonicalize`] so that equality is string equality:
//!
//! 1. Trim surrounding whitespace
//! 2. Default the scheme to `https` when missing
//! 3. Reject anything other than `http`/`https`
//! 4. Lowercase the host
//! 5. Strip the fragment (`#...`)
//! 6. Keep the query string byte-for-byte (ordering matters for matching)

use crate::error::Error;

/// Canonicalize a URL string into a parsed, fragment-free `Url`.
pub fn canonicalize(input: &str) -> Result<url::Url, Error> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(Error::InvalidRequest("empty URL".into()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut parsed = url::Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidRequest(format!("invalid URL {trimmed:?}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(Error::InvalidRequest(format!("unsupported scheme: {scheme}")));
        }
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| Error::InvalidRequest(format!("invalid host: {e}")))?;
        }
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
