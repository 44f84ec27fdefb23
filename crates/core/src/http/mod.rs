//! Request/response descriptors and the single-read body handle.
//!
//! These are deliberately small: the cache needs HTTP *vocabulary* (methods,
//! status codes, header multimaps, URLs), not a transport. The injected
//! [`Fetch`](crate::fetch::Fetch) capability converts to and from whatever
//! client library actually moves bytes.

pub mod date;
pub mod url;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode};

use crate::error::Error;

pub use url::canonicalize;

/// An immutable request descriptor.
///
/// The URL is canonicalized at construction (fragment stripped, host
/// lowercased); the cache never mutates a request after that.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: ::url::Url,
    headers: HeaderMap,
}

impl Request {
    /// Build a GET request for a URL string.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::new(Method::GET, url, HeaderMap::new())
    }

    /// Build a request with an explicit method and headers.
    pub fn new(method: Method, url: &str, headers: HeaderMap) -> Result<Self, Error> {
        let url = canonicalize(url)?;
        Ok(Self { method, url, headers })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &::url::Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, as a string. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Copy of this request with extra headers layered on top (used to attach
    /// conditional validators for revalidation).
    pub(crate) fn with_extra_headers(&self, extra: &HeaderMap) -> Self {
        let mut headers = self.headers.clone();
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }
        Self { method: self.method.clone(), url: self.url.clone(), headers }
    }
}

/// A single-read body handle.
///
/// Reading moves the bytes out; a second read observes `None`. The store
/// keeps raw `Bytes` internally and hands each caller a fresh `Body`, so
/// reading one returned copy never drains another.
#[derive(Debug)]
pub struct Body {
    bytes: Option<Bytes>,
}

impl Body {
    pub fn empty() -> Self {
        Self { bytes: Some(Bytes::new()) }
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: Some(bytes.into()) }
    }

    /// Take the body contents. Yields `Some` exactly once.
    pub fn read(&mut self) -> Option<Bytes> {
        self.bytes.take()
    }

    pub fn is_consumed(&self) -> bool {
        self.bytes.is_none()
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::from_bytes(Bytes::copy_from_slice(s.as_bytes()))
    }
}

/// A response descriptor with an unread body and a capture timestamp.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    received_at: DateTime<Utc>,
}

impl Response {
    /// Wrap a freshly received response; `received_at` is stamped now.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self { status, headers, body, received_at: Utc::now() }
    }

    /// As [`Response::new`] with an explicit capture timestamp.
    pub fn received_at(status: StatusCode, headers: HeaderMap, body: Body, at: DateTime<Utc>) -> Self {
        Self { status, headers, body, received_at: at }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn capture_time(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Read the body. Yields `Some` on the first call only.
    pub fn read_body(&mut self) -> Option<Bytes> {
        self.body.read()
    }

    /// Read the body as UTF-8 text (lossy).
    pub fn text(&mut self) -> Option<String> {
        self.read_body().map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

/// All values of a header joined with `", "`, the form header field lists
/// compare in (used for Vary discrimination).
pub(crate) fn joined_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let mut values = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .peekable();
    values.peek()?;
    Some(values.collect::<Vec<_>>().join(", "))
}
