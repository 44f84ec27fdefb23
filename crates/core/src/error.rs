//! Unified error types for cachette.
//!
//! Every failure a caller can observe carries a stable SCREAMING code in its
//! display string so log lines and test assertions stay grep-able.

/// Why a response was refused storage by the freshness policy engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorabilityViolation {
    /// 206 Partial Content responses are never stored.
    #[error("partial content (206) responses are not cacheable")]
    PartialContent,

    /// Response status outside the 2xx success range.
    #[error("response status {0} is not a success status")]
    ErrorStatus(u16),

    /// Only GET requests produce storable entries.
    #[error("request method {0} is not cacheable")]
    NonGetMethod(String),

    /// Response carried `Cache-Control: no-store`.
    #[error("response has Cache-Control: no-store")]
    NoStore,

    /// `Vary: *` entries can never be matched deterministically.
    #[error("response has Vary: *")]
    VaryWildcard,

    /// The response body handle was already read.
    #[error("response body has already been consumed")]
    BodyConsumed,
}

/// Unified error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request: bad URL, unsupported scheme, or a method the
    /// operation cannot accept.
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),

    /// The response failed the storability rules; the store is unchanged.
    #[error("NOT_STORABLE: {0}")]
    NotStorable(#[from] StorabilityViolation),

    /// Upstream fetch during `add`/`add_all` returned a non-success status.
    #[error("FETCH_NOT_OK: {url} returned status {status}")]
    FetchNotOk { url: String, status: u16 },

    /// Transport-level fetch failure. Surfaced from `add`/`add_all`;
    /// recovered by stale-serve during revalidation.
    #[error("FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// Configuration could not be loaded or failed validation.
    #[error("CONFIG_ERROR: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_codes() {
        let err = Error::FetchNotOk { url: "https://example.com/".into(), status: 500 };
        assert!(err.to_string().contains("FETCH_NOT_OK"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_storability_violation_into_error() {
        let err: Error = StorabilityViolation::NoStore.into();
        assert!(err.to_string().contains("NOT_STORABLE"));
        assert!(err.to_string().contains("no-store"));
    }
}
