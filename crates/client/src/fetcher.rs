//! reqwest-backed implementation of the `Fetch` capability.
//!
//! Timeout, redirect policy, and decompression live here: the cache core
//! imposes none of its own. Decompression matters for correctness, not just
//! bandwidth — stored bodies must be the identity representation so that a
//! 304 merge can reuse them under replaced headers.

use std::time::Instant;

use async_trait::async_trait;

use cachette_core::config::CacheConfig;
use cachette_core::error::Error;
use cachette_core::fetch::Fetch;
use cachette_core::http::{Body, Request, Response};

/// HTTP fetcher built on a shared reqwest client.
pub struct ReqwestFetcher {
    http: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a fetcher from the cache configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchFailed`] when the underlying client cannot be
    /// constructed (e.g. no TLS backend available).
    pub fn new(config: &CacheConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Fetch for ReqwestFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("network error: {e}")))?;

        let status = response.status();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchFailed(format!("failed to read response body: {e}")))?;

        tracing::debug!(
            url = %request.url(),
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched upstream response"
        );

        Ok(Response::new(status, headers, Body::from_bytes(bytes)))
    }
}
