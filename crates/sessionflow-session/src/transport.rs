//! The transport seam (§4.6): HTTP wire encoding and TLS are an out-of-scope
//! external collaborator, abstracted behind one async [`Transport`] trait so
//! the orchestrator never hard-codes a specific I/O library — the same shape
//! `sessionflow_core::Waiter` uses to let one algorithm serve both call
//! styles. The sync session drives this same trait through its background
//! event loop rather than a second, duplicated sync trait, matching how
//! every cache/rate-limit backend in this workspace is async-only and lets
//! the caller choose how to wait.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use url::Url;

/// Opaque transport failure. Kept as a boxed `std::error::Error` rather than
/// an associated type so [`Transport`] stays object-safe and a single
/// `Arc<dyn Transport>` can be shared across sync and async sessions alike.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the transport needs to perform one HTTP call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub http2: bool,
    /// Resolved overall deadline for this call (§4.6 timeout sugar already
    /// flattened to one value by the time it reaches the transport).
    pub timeout: Option<Duration>,
}

/// What the transport handed back, before normalization into
/// [`sessionflow_response::Response`].
#[derive(Debug)]
pub struct TransportResponse {
    pub version: Version,
    pub status: StatusCode,
    pub real_url: Url,
    pub headers: HeaderMap,
    pub cookies: Vec<(String, String)>,
    pub body: Bytes,
}

/// An HTTP client abstraction the session orchestrator dispatches through.
pub trait Transport: Send + Sync {
    /// Performs one HTTP call.
    fn call<'a>(
        &'a self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;
}

/// The default [`Transport`], backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with HTTP/2 negotiation either forced off or left
    /// to ALPN, matching the `http2` session construction option (§6).
    pub fn new(http2_prior_knowledge: bool) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if http2_prior_knowledge {
            builder = builder.http2_prior_knowledge();
        }
        Ok(ReqwestTransport {
            client: builder.build().map_err(|e| Box::new(e) as TransportError)?,
        })
    }
}

impl Transport for ReqwestTransport {
    fn call<'a>(
        &'a self,
        request: TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method, request.url.clone())
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await.map_err(|e| Box::new(e) as TransportError)?;

            let version = response.version();
            let status = response.status();
            let real_url = response.url().clone();
            let headers = response.headers().clone();
            let cookies = response
                .cookies()
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect();
            let body = response.bytes().await.map_err(|e| Box::new(e) as TransportError)?;

            Ok(TransportResponse {
                version,
                status,
                real_url,
                headers,
                cookies,
                body,
            })
        })
    }
}
