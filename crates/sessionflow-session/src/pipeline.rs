//! The per-request pipeline (§4.6): the ten steps from flag resolution
//! through callbacks, written once and shared verbatim by the sync and
//! async session facades. The only thing that differs between the two call
//! styles is which [`Waiter`] they pass in — the same "implement once,
//! parameterize the wait" shape `sessionflow_ratelimit::RateLimiter::increment`
//! already uses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::USER_AGENT;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use sessionflow_cache::Cache;
use sessionflow_core::Waiter;
use sessionflow_ratelimit::RateLimiter;
use sessionflow_response::{RequestInfo, Response, ResponseBuilder};

use crate::callback::{run_callbacks, Callback, ProgressTick};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::transport::{Transport, TransportError, TransportRequest};

/// Everything about one call that isn't already fixed by the session: the
/// method/URL/headers/body plus the per-call overrides §4.6 allows for the
/// session's cache/ratelimit defaults.
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub cache: Option<bool>,
    pub ratelimit: Option<bool>,
    pub extra_keys: Vec<String>,
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url) -> Self {
        RequestSpec {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            cache: None,
            ratelimit: None,
            extra_keys: Vec::new(),
            timeout: None,
        }
    }
}

/// Capabilities a single pipeline run is composed of (§9: "`Session` is a
/// struct composed of a `Transport` capability, an optional `Cache`
/// capability, and an optional `RateLimiter` capability").
pub struct Capabilities<'a> {
    pub transport: &'a dyn Transport,
    pub cache: Option<&'a Cache>,
    pub ratelimit: Option<&'a RateLimiter>,
    pub waiter: &'a dyn Waiter,
}

/// A small built-in rotation, standing in for the out-of-scope external
/// user-agent provider (§1) so the crate is independently usable without a
/// caller having to supply one just to exercise `random_user_agents`.
const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
];

fn next_default_user_agent() -> &'static str {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let i = COUNTER.fetch_add(1, Ordering::Relaxed) % DEFAULT_USER_AGENTS.len();
    DEFAULT_USER_AGENTS[i]
}

fn has_user_agent(session_headers: &HeaderMap, request_headers: &HeaderMap) -> bool {
    request_headers.contains_key(USER_AGENT) || session_headers.contains_key(USER_AGENT)
}

/// Headers for one call: per-request headers layered over session defaults,
/// per-request winning on clash (§4.6 header precedence).
fn merge_headers(session_headers: &HeaderMap, request_headers: HeaderMap) -> HeaderMap {
    let mut merged = session_headers.clone();
    for (name, value) in request_headers.iter() {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

fn classify_transport_error(err: &TransportError) -> (StatusCode, &'static str, &'static str) {
    if let Some(reqwest_err) = err.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() {
            return (StatusCode::REQUEST_TIMEOUT, "Request Timeout", "connect");
        }
    }
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", "transport")
}

fn synthesize_error_response(
    request: RequestInfo,
    err: &TransportError,
    elapsed: Duration,
) -> Response {
    let (status, reason, _stage) = classify_transport_error(err);
    ResponseBuilder::new(status, request.method.clone(), request.url.clone())
        .reason(reason)
        .request(request)
        .elapsed(elapsed)
        .error(err.to_string())
        .build()
}

/// Runs the full per-request pipeline (§4.6 steps 1-10) for one call.
pub async fn execute_request(
    caps: Capabilities<'_>,
    session: &SessionConfig,
    callbacks: &[Callback],
    run_callbacks_on_error: bool,
    progress_tick: Option<&ProgressTick>,
    spec: RequestSpec,
) -> Result<Response, SessionError> {
    // Step 1: resolve effective cache/ratelimit flags (per-call override,
    // else whether the session was built with that capability at all).
    let effective_cache = caps.cache.is_some() && spec.cache.unwrap_or(true);
    let effective_ratelimit = caps.ratelimit.is_some() && spec.ratelimit.unwrap_or(true);

    // Step 2: rate-limit gate. Dropping this future (caller cancellation)
    // drops the `increment` call before it records an admission, so
    // cancellation here never consumes a slot (§9 Q1) and never proceeds to
    // dispatch the transport.
    if effective_ratelimit {
        let limiter = caps.ratelimit.expect("checked by effective_ratelimit");
        let extra_keys: Vec<&str> = spec.extra_keys.iter().map(String::as_str).collect();
        let key = limiter.key_for(Some(&spec.url), &extra_keys);
        limiter.increment(&key, caps.waiter).await?;
    }

    // Step 3: cache lookup, short-circuiting on hit.
    if effective_cache {
        let cache = caps.cache.expect("checked by effective_cache");
        if let Some(mut response) = cache.get(spec.url.as_str()).await? {
            run_callbacks(&mut response, true, callbacks, run_callbacks_on_error, progress_tick);
            return Ok(response);
        }
    }

    // Step 4: random user-agent injection, only when enabled, the caller
    // didn't already supply one, and the session default hasn't either.
    let mut headers = merge_headers(&session.headers, spec.headers);
    if session.random_user_agents && !has_user_agent(&session.headers, &headers) {
        headers.insert(USER_AGENT, next_default_user_agent().parse().expect("static UA is valid"));
    }

    let request_info = RequestInfo {
        url: spec.url.clone(),
        method: spec.method.clone(),
        headers: headers.clone(),
    };

    // Step 5: dispatch, bracketed by a monotonic clock.
    let transport_request = TransportRequest {
        method: spec.method.clone(),
        url: spec.url.clone(),
        headers,
        body: spec.body,
        http2: session.http2,
        timeout: spec.timeout,
    };
    let start = Instant::now();
    let outcome = caps.transport.call(transport_request).await;
    let elapsed = start.elapsed();

    // Step 6-7: map transport errors into the §7 taxonomy, or normalize a
    // success into a Response.
    let mut response = match outcome {
        Ok(transport_response) => ResponseBuilder::new(
            transport_response.status,
            spec.method.clone(),
            spec.url.clone(),
        )
        .version(transport_response.version)
        .real_url(transport_response.real_url)
        .content(transport_response.body)
        .cookies(transport_response.cookies)
        .headers(transport_response.headers)
        .request(request_info)
        .elapsed(elapsed)
        .build(),
        Err(err) => {
            if session.raise_errors {
                let (_, _, stage) = classify_transport_error(&err);
                return Err(if stage == "connect" {
                    SessionError::Timeout { stage: "connect" }
                } else {
                    SessionError::Transport(err)
                });
            }
            synthesize_error_response(request_info, &err, elapsed)
        }
    };

    // Step 8: only cache 2xx responses.
    if effective_cache && (200..300).contains(&response.status.as_u16()) {
        let cache = caps.cache.expect("checked by effective_cache");
        cache.set(spec.url.as_str(), &response).await?;
    }

    // Step 9: callbacks, never allowed to fail the request.
    run_callbacks(&mut response, false, callbacks, run_callbacks_on_error, progress_tick);

    // Step 10.
    Ok(response)
}
