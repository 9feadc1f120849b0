//! The uniform response record produced by every transport this workspace
//! talks to, plus the request metadata that produced it.
//!
//! A [`Response`] is logically immutable after construction: the fields the
//! orchestrator fills in later (`is_cached`, `callback_results`) are the only
//! ones ever mutated post-construction, and `text`/`json` are lazy
//! derivations over `content` rather than separate mutable fields.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use url::Url;

mod serde_impl;

pub use serde_impl::ResponseError;

/// Metadata about the request that produced a [`Response`].
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
}

/// The outcome of running a single user callback: either its (opaque,
/// stringified) return value or the panic/error message it raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Ok(String),
    Err(String),
}

/// A uniform HTTP response record, normalized from whatever transport
/// produced it.
///
/// `text` and `json` are cached lazily the first time they're read; a JSON
/// parse failure yields an empty object rather than an error, matching how
/// callers expect `response.json()` to never raise.
#[derive(Debug)]
pub struct Response {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
    pub method: Method,
    pub url: Url,
    pub real_url: Url,
    pub content: Bytes,
    pub charset: Option<String>,
    pub cookies: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub history: Vec<Url>,
    pub request: RequestInfo,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub callback_results: Vec<CallbackOutcome>,
    pub is_cached: bool,

    text_cache: OnceLock<String>,
    json_cache: OnceLock<serde_json::Value>,
}

/// Everything needed to build a [`Response`]; mirrors the constructor
/// accepting the full superset of fields with the rest defaulted.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    version: Version,
    status: StatusCode,
    reason: Option<String>,
    method: Method,
    url: Url,
    real_url: Option<Url>,
    content: Bytes,
    charset: Option<String>,
    cookies: Vec<(String, String)>,
    headers: HeaderMap,
    history: Vec<Url>,
    request: RequestInfo,
    elapsed: Duration,
    error: Option<String>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode, method: Method, url: Url) -> Self {
        let request = RequestInfo {
            url: url.clone(),
            method: method.clone(),
            headers: HeaderMap::new(),
        };
        ResponseBuilder {
            version: Version::HTTP_11,
            status,
            reason: None,
            method,
            real_url: None,
            url,
            content: Bytes::new(),
            charset: None,
            cookies: Vec::new(),
            headers: HeaderMap::new(),
            history: Vec::new(),
            request,
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn real_url(mut self, real_url: Url) -> Self {
        self.real_url = Some(real_url);
        self
    }

    pub fn content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn cookies(mut self, cookies: Vec<(String, String)>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn history(mut self, history: Vec<Url>) -> Self {
        self.history = history;
        self
    }

    pub fn request(mut self, request: RequestInfo) -> Self {
        self.request = request;
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn build(self) -> Response {
        let reason = self
            .reason
            .unwrap_or_else(|| default_reason_phrase(self.status));
        Response {
            version: self.version,
            status: self.status,
            reason,
            method: self.method,
            real_url: self.real_url.unwrap_or_else(|| self.url.clone()),
            url: self.url,
            content: self.content,
            charset: self.charset,
            cookies: self.cookies,
            headers: self.headers,
            history: self.history,
            request: self.request,
            elapsed: self.elapsed,
            error: self.error,
            callback_results: Vec::new(),
            is_cached: false,
            text_cache: OnceLock::new(),
            json_cache: OnceLock::new(),
        }
    }
}

fn default_reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string()
}

impl Response {
    /// `true` iff the status code is below 400, mirroring requests/httpx's
    /// `ok` flag.
    pub fn ok(&self) -> bool {
        self.status.as_u16() < 400
    }

    /// Rust has no ad-hoc boolean coercion of structs; use this where the
    /// original would write `if response:`.
    pub fn is_truthy(&self) -> bool {
        self.ok()
    }

    /// The body decoded as UTF-8 (or the configured charset), computed once
    /// and cached for subsequent calls.
    pub fn text(&self) -> &str {
        self.text_cache.get_or_init(|| {
            String::from_utf8_lossy(&self.content).into_owned()
        })
    }

    /// The body parsed as JSON. A parse failure yields an empty object,
    /// never an error — the record owns the "never raises" contract so
    /// callers don't each need to special-case malformed bodies.
    pub fn json(&self) -> &serde_json::Value {
        self.json_cache.get_or_init(|| {
            serde_json::from_slice(&self.content)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
        })
    }

    /// Attaches callback outcomes; called once by the callback runner.
    pub fn set_callback_results(&mut self, results: Vec<CallbackOutcome>) {
        self.callback_results = results;
    }

    /// Marks this response as served from cache; called once by the cache
    /// layer on a hit.
    pub fn set_is_cached(&mut self, is_cached: bool) {
        self.is_cached = is_cached;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: u16, body: &str) -> Response {
        ResponseBuilder::new(
            StatusCode::from_u16(status).unwrap(),
            Method::GET,
            Url::parse("https://example.com/x").unwrap(),
        )
        .content(Bytes::from(body.to_string()))
        .build()
    }

    #[test]
    fn ok_is_derived_from_status() {
        assert!(sample(200, "{}").ok());
        assert!(!sample(404, "{}").ok());
        assert!(!sample(500, "{}").ok());
    }

    #[test]
    fn text_is_cached_across_calls() {
        let r = sample(200, "hello");
        assert_eq!(r.text(), "hello");
        assert_eq!(r.text(), "hello");
    }

    #[test]
    fn json_parse_failure_yields_empty_object_never_panics() {
        let r = sample(200, "not json");
        assert_eq!(r.json(), &serde_json::json!({}));
    }

    #[test]
    fn json_parses_valid_body() {
        let r = sample(200, r#"{"a":1}"#);
        assert_eq!(r.json(), &serde_json::json!({"a": 1}));
    }

    #[test]
    fn default_real_url_matches_url_when_no_redirect() {
        let r = sample(200, "");
        assert_eq!(r.real_url, r.url);
    }
}
