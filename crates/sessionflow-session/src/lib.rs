//! The session orchestrator (C6/C7): the public surface composed on top of
//! [`pipeline::execute_request`] — an async-native [`AsyncSession`] and a
//! sync [`Session`] that drives the identical pipeline through a background
//! event loop, the same "one algorithm, two waiters" split
//! `sessionflow_ratelimit::RateLimiter::increment` already establishes.

pub mod callback;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transport;

use std::future::Future;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use http::Method;
use url::Url;

use sessionflow_cache::Cache;
use sessionflow_core::{BlockingWaiter, CooperativeWaiter};
use sessionflow_ratelimit::RateLimiter;

pub use callback::{Callback, ProgressTick};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{SessionConfigError, SessionError, SessionResult};
pub use pipeline::RequestSpec;
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};

use pipeline::{execute_request, Capabilities};

/// The capabilities shared by both session facades, built once from a
/// [`SessionConfig`] and a [`Transport`] (§9: "`Session` is a struct composed
/// of a `Transport` capability, an optional `Cache` capability, and an
/// optional `RateLimiter` capability").
struct Inner {
    transport: Arc<dyn Transport>,
    cache: Option<Cache>,
    ratelimit: Option<RateLimiter>,
    config: SessionConfig,
}

impl Inner {
    async fn build(
        mut config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionConfigError> {
        let cache = match config.cache.take() {
            Some(cache_config) => Some(Cache::new(cache_config).await?),
            None => None,
        };
        let ratelimit = match config.ratelimit.take() {
            Some(ratelimit_config) => Some(RateLimiter::new(ratelimit_config).await?),
            None => None,
        };
        Ok(Inner { transport, cache, ratelimit, config })
    }
}

fn build_default_transport(http2: bool) -> Result<Arc<dyn Transport>, SessionConfigError> {
    let transport = ReqwestTransport::new(http2)
        .map_err(|e| SessionConfigError::Transport(e.to_string()))?;
    Ok(Arc::new(transport))
}

/// A native async HTTP session: caching, rate limiting, and a pluggable
/// transport behind one request pipeline, suspending on a [`CooperativeWaiter`]
/// so concurrent fan-out calls keep making progress while one of them waits
/// on rate-limit admission.
pub struct AsyncSession {
    inner: Arc<Inner>,
}

impl AsyncSession {
    /// Builds a session over the default `reqwest`-backed transport.
    pub async fn new(config: SessionConfig) -> Result<Self, SessionConfigError> {
        let transport = build_default_transport(config.http2)?;
        Self::with_transport(config, transport).await
    }

    /// Builds a session over a caller-supplied transport, for tests or
    /// alternative HTTP stacks.
    pub async fn with_transport(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionConfigError> {
        Ok(AsyncSession { inner: Arc::new(Inner::build(config, transport).await?) })
    }

    /// Runs one request through the pipeline (§4.6).
    pub async fn request(
        &self,
        spec: RequestSpec,
        callbacks: &[Callback],
        run_callbacks_on_error: bool,
        progress_tick: Option<&ProgressTick>,
    ) -> SessionResult<sessionflow_response::Response> {
        let caps = Capabilities {
            transport: self.inner.transport.as_ref(),
            cache: self.inner.cache.as_ref(),
            ratelimit: self.inner.ratelimit.as_ref(),
            waiter: &CooperativeWaiter,
        };
        execute_request(
            caps,
            &self.inner.config,
            callbacks,
            run_callbacks_on_error,
            progress_tick,
            spec,
        )
        .await
    }

    /// Runs many requests concurrently, returning results in input order
    /// (§4.6 fan-out: one progress tick per completed request, not per
    /// callback).
    pub async fn requests(
        &self,
        specs: Vec<RequestSpec>,
        callbacks: &[Callback],
        run_callbacks_on_error: bool,
        progress_tick: Option<&ProgressTick>,
    ) -> Vec<SessionResult<sessionflow_response::Response>> {
        let futures = specs
            .into_iter()
            .map(|spec| self.request(spec, callbacks, run_callbacks_on_error, progress_tick));
        futures::future::join_all(futures).await
    }

    /// Shorthand for `GET url` with no callbacks.
    pub async fn get(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::GET, url), &[], false, None).await
    }

    /// Shorthand for `HEAD url` with no callbacks.
    pub async fn head(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::HEAD, url), &[], false, None).await
    }

    /// Shorthand for `OPTIONS url` with no callbacks.
    pub async fn options(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::OPTIONS, url), &[], false, None).await
    }

    /// Shorthand for `DELETE url` with no callbacks.
    pub async fn delete(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::DELETE, url), &[], false, None).await
    }

    /// Shorthand for `POST url` with a body and no callbacks.
    pub async fn post(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::POST, url);
        spec.body = Some(body);
        self.request(spec, &[], false, None).await
    }

    /// Shorthand for `PUT url` with a body and no callbacks.
    pub async fn put(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::PUT, url);
        spec.body = Some(body);
        self.request(spec, &[], false, None).await
    }

    /// Shorthand for `PATCH url` with a body and no callbacks.
    pub async fn patch(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::PATCH, url);
        spec.body = Some(body);
        self.request(spec, &[], false, None).await
    }

    /// Tears the session down (§5 teardown): releases the cache and
    /// rate-limit handles, which tears the shared backend pool down behind
    /// them once this was the last session using it, and closes the
    /// transport. Consuming `self` makes the teardown explicit at the call
    /// site; dropping the session without calling `close` runs the same
    /// sequence, since `Inner`'s fields carry out their own teardown on drop.
    pub fn close(self) {}
}

type Job = Box<dyn FnOnce(&tokio::runtime::Runtime) + Send>;

/// A persistent background thread owning a multi-thread Tokio runtime,
/// grounded in the same "hand the caller a `Handle` it doesn't have to
/// manage" idea as this workspace's executor crate, but extended to own the
/// thread itself so a sync [`Session`] has somewhere to actually run its
/// futures (§5: session construction/teardown).
///
/// Multi-thread rather than current-thread: a fan-out call's individual
/// requests each wait on rate-limit admission via [`BlockingWaiter`], which
/// blocks whichever worker thread is running it. A single-threaded runtime
/// would serialize those waits and defeat the point of fanning out.
struct Background {
    sender: Option<std_mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Background {
    fn start() -> Self {
        let (sender, receiver) = std_mpsc::channel::<Job>();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .expect("failed to build the session's background tokio runtime");
            for job in receiver {
                job(&runtime);
            }
        });
        Background { sender: Some(sender), thread: Some(thread) }
    }

    /// Hands `f` to the background thread and blocks the caller until it
    /// completes, returning its result.
    fn run<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&tokio::runtime::Runtime) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = std_mpsc::channel::<T>();
        let job: Job = Box::new(move |runtime| {
            let _ = result_tx.send(f(runtime));
        });
        self.sender
            .as_ref()
            .expect("background thread has already been stopped")
            .send(job)
            .expect("background thread has already stopped");
        result_rx.recv().expect("background thread dropped the result channel without replying")
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        // Drop the sender first so the receiver's `for job in receiver` loop
        // ends and the thread's closure returns; only then join it.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

enum Execution {
    /// No persistent thread: each call builds a short-lived current-thread
    /// runtime and blocks on it directly, on the caller's own OS thread.
    Inline,
    /// A persistent background thread, spun up once at construction
    /// (`SessionConfigBuilder::threaded(true)`).
    Background(Background),
}

/// A synchronous HTTP session over the same capabilities and pipeline as
/// [`AsyncSession`], suspending on a [`BlockingWaiter`] instead.
pub struct Session {
    inner: Arc<Inner>,
    execution: Execution,
}

impl Session {
    /// Builds a session over the default `reqwest`-backed transport.
    pub fn new(config: SessionConfig) -> Result<Self, SessionConfigError> {
        let transport = build_default_transport(config.http2)?;
        Self::with_transport(config, transport)
    }

    /// Builds a session over a caller-supplied transport, for tests or
    /// alternative HTTP stacks.
    pub fn with_transport(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionConfigError> {
        if config.threaded {
            let background = Background::start();
            let inner = background.run(move |runtime| runtime.block_on(Inner::build(config, transport)))?;
            Ok(Session { inner: Arc::new(inner), execution: Execution::Background(background) })
        } else {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| SessionConfigError::Transport(e.to_string()))?;
            let inner = runtime.block_on(Inner::build(config, transport))?;
            Ok(Session { inner: Arc::new(inner), execution: Execution::Inline })
        }
    }

    /// Runs a `'static` future to completion, either inline on this thread
    /// or by handing it to the background thread and blocking for the
    /// result.
    fn run_future<F, T>(&self, future: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match &self.execution {
            Execution::Inline => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build an ephemeral tokio runtime");
                runtime.block_on(future)
            }
            Execution::Background(background) => {
                background.run(move |runtime| runtime.block_on(future))
            }
        }
    }

    /// Runs one request through the pipeline (§4.6). `callbacks` and
    /// `progress_tick` are taken by value: the background-thread path needs
    /// them to outlive this call on another thread, and the inline path has
    /// no reason to ask for a different shape.
    pub fn request(
        &self,
        spec: RequestSpec,
        callbacks: Vec<Callback>,
        run_callbacks_on_error: bool,
        progress_tick: Option<ProgressTick>,
    ) -> SessionResult<sessionflow_response::Response> {
        let inner = self.inner.clone();
        self.run_future(async move {
            let caps = Capabilities {
                transport: inner.transport.as_ref(),
                cache: inner.cache.as_ref(),
                ratelimit: inner.ratelimit.as_ref(),
                waiter: &BlockingWaiter,
            };
            execute_request(
                caps,
                &inner.config,
                &callbacks,
                run_callbacks_on_error,
                progress_tick.as_ref(),
                spec,
            )
            .await
        })
    }

    /// Runs many requests concurrently on the executing runtime, returning
    /// results in input order.
    pub fn requests(
        &self,
        specs: Vec<RequestSpec>,
        callbacks: Vec<Callback>,
        run_callbacks_on_error: bool,
        progress_tick: Option<ProgressTick>,
    ) -> Vec<SessionResult<sessionflow_response::Response>> {
        let inner = self.inner.clone();
        self.run_future(async move {
            let callbacks = Arc::new(callbacks);
            let futures = specs.into_iter().map(|spec| {
                let inner = inner.clone();
                let callbacks = callbacks.clone();
                let progress_tick = progress_tick.clone();
                async move {
                    let caps = Capabilities {
                        transport: inner.transport.as_ref(),
                        cache: inner.cache.as_ref(),
                        ratelimit: inner.ratelimit.as_ref(),
                        waiter: &BlockingWaiter,
                    };
                    execute_request(
                        caps,
                        &inner.config,
                        &callbacks,
                        run_callbacks_on_error,
                        progress_tick.as_ref(),
                        spec,
                    )
                    .await
                }
            });
            futures::future::join_all(futures).await
        })
    }

    /// Shorthand for `GET url` with no callbacks.
    pub fn get(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::GET, url), Vec::new(), false, None)
    }

    /// Shorthand for `HEAD url` with no callbacks.
    pub fn head(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::HEAD, url), Vec::new(), false, None)
    }

    /// Shorthand for `OPTIONS url` with no callbacks.
    pub fn options(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::OPTIONS, url), Vec::new(), false, None)
    }

    /// Shorthand for `DELETE url` with no callbacks.
    pub fn delete(&self, url: Url) -> SessionResult<sessionflow_response::Response> {
        self.request(RequestSpec::new(Method::DELETE, url), Vec::new(), false, None)
    }

    /// Shorthand for `POST url` with a body and no callbacks.
    pub fn post(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::POST, url);
        spec.body = Some(body);
        self.request(spec, Vec::new(), false, None)
    }

    /// Shorthand for `PUT url` with a body and no callbacks.
    pub fn put(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::PUT, url);
        spec.body = Some(body);
        self.request(spec, Vec::new(), false, None)
    }

    /// Shorthand for `PATCH url` with a body and no callbacks.
    pub fn patch(&self, url: Url, body: Bytes) -> SessionResult<sessionflow_response::Response> {
        let mut spec = RequestSpec::new(Method::PATCH, url);
        spec.body = Some(body);
        self.request(spec, Vec::new(), false, None)
    }

    /// Tears the session down (§5 teardown): stops the background thread if
    /// one was spun up (`Drop for Background`), releases the cache and
    /// rate-limit handles, and closes the transport. Consuming `self` makes
    /// the teardown explicit at the call site; a plain drop runs the same
    /// sequence since `execution` and `inner` both carry out their own
    /// teardown on drop.
    pub fn close(self) {}
}
