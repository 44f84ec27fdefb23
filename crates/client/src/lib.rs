//! Default fetch capability for cachette.
//!
//! Provides [`ReqwestFetcher`], the production implementation of the core
//! crate's `Fetch` trait, backed by reqwest with rustls TLS and transparent
//! gzip/brotli/deflate decompression.

pub mod fetcher;

pub use fetcher::ReqwestFetcher;
