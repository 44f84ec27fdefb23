//! The fetch capability seam.
//!
//! The cache never talks to the network directly; it is handed something
//! implementing [`Fetch`] at construction. Production code injects the
//! reqwest-backed fetcher from `cachette-client`; tests inject scripted
//! fetchers.

use async_trait::async_trait;

use crate::error::Error;
use crate::http::{Request, Response};

/// Capability to fetch a response for a request.
///
/// Implementations own their own timeout and redirect policy; the cache core
/// imposes none.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform the request. Transport-level failures map to
    /// [`Error::FetchFailed`].
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
