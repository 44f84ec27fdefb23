//! Core cache semantics for cachette.
//!
//! This crate provides:
//! - Cache-API-shaped operations (`match`/`matchAll`/`put`/`delete`/`keys`/
//!   `add`/`addAll`) over a bounded in-memory store
//! - The freshness/revalidation policy engine
//! - Request matching with `ignore_search`/`ignore_method`/`ignore_vary`
//! - LRU + hard-TTL eviction
//! - The `Fetch` capability seam (the default implementation lives in
//!   `cachette-client`)

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod http;
pub mod matching;
pub mod policy;
pub mod registry;
pub mod store;

pub use cache::HttpCache;
pub use config::CacheConfig;
pub use error::{Error, StorabilityViolation};
pub use fetch::Fetch;
pub use crate::http::{Body, Request, Response};
pub use matching::MatchOptions;
pub use registry::CacheStorage;
