//! Session construction options (§6): one fluent builder composing the
//! cache and rate-limiter sub-configs, following this workspace's existing
//! `XConfigBuilder::new() -> .field(value) -> .build() -> Result<X, XError>`
//! shape rather than a loose options bag.

use std::time::Duration;

use http::HeaderMap;

use sessionflow_cache::{CacheConfig, CacheConfigBuilder};
use sessionflow_pool::BackendKind;
use sessionflow_ratelimit::{RateLimitConfig, RateLimitConfigBuilder};

use crate::error::SessionConfigError;

/// Which of the five contractual algorithms (§4.5.1) the rate limiter, if
/// enabled, is configured with.
#[derive(Debug, Clone, Copy)]
enum AlgorithmChoice {
    SlidingWindow { window: Duration, limit: usize },
    FixedWindow { window: Duration, limit: usize },
    TokenBucket { capacity: f64, fill_rate: f64 },
    LeakyBucket { capacity: f64, leak_rate: f64 },
    Gcra { period: Duration, burst_limit: f64 },
}

/// Validated, immutable session configuration.
pub struct SessionConfig {
    pub(crate) headers: HeaderMap,
    pub(crate) http2: bool,
    pub(crate) random_user_agents: bool,
    pub(crate) threaded: bool,
    pub(crate) raise_errors: bool,
    pub(crate) cache: Option<CacheConfig>,
    pub(crate) ratelimit: Option<RateLimitConfig>,
}

/// Builder for [`SessionConfig`].
pub struct SessionConfigBuilder {
    headers: HeaderMap,
    http2: bool,
    random_user_agents: bool,
    threaded: bool,
    backend: BackendKind,
    cache_backend: Option<sessionflow_cache::BackendOptions>,
    ratelimit_backend: Option<sessionflow_ratelimit::BackendOptions>,
    cache_enabled: bool,
    ratelimit_enabled: bool,
    namespace: String,
    algorithm: AlgorithmChoice,
    cache_timeout: Duration,
    check_frequency: Duration,
    per_host: bool,
    per_endpoint: bool,
    sleep_duration: Duration,
    raise_errors: bool,
    compression: bool,
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfigBuilder {
    /// Creates a new builder: no caching, no rate limiting, in-memory
    /// backend, HTTP/2 negotiation left to ALPN, no forced background
    /// thread.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            http2: false,
            random_user_agents: false,
            threaded: false,
            backend: BackendKind::InMemory,
            cache_backend: None,
            ratelimit_backend: None,
            cache_enabled: false,
            ratelimit_enabled: false,
            namespace: "sessionflow".to_string(),
            algorithm: AlgorithmChoice::SlidingWindow {
                window: Duration::from_secs(1),
                limit: 50,
            },
            cache_timeout: Duration::from_secs(300),
            check_frequency: Duration::from_secs(15),
            per_host: false,
            per_endpoint: false,
            sleep_duration: Duration::from_millis(50),
            raise_errors: false,
            compression: false,
        }
    }

    /// Session-default headers, merged under per-request headers (§4.6
    /// header precedence: per-request wins on clash).
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Enables HTTP/2 prior-knowledge negotiation on the transport.
    pub fn http2(mut self, enabled: bool) -> Self {
        self.http2 = enabled;
        self
    }

    /// Injects a random user-agent when the caller and session both leave
    /// it unset.
    pub fn random_user_agents(mut self, enabled: bool) -> Self {
        self.random_user_agents = enabled;
        self
    }

    /// Spawns a background event-loop thread at construction for a sync
    /// [`crate::Session`]'s fan-out calls, rather than one lazily on first
    /// use.
    pub fn threaded(mut self, enabled: bool) -> Self {
        self.threaded = enabled;
        self
    }

    /// The namespace cache/limiter keys are joined under, and the default
    /// identity for the in-memory backend.
    pub fn key(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Selects the storage substrate both caching and rate limiting use by
    /// default. `sqlite`/`redis` require [`Self::cache_backend`] and/or
    /// [`Self::ratelimit_backend`] to supply the connection details this
    /// enum alone can't carry.
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Supplies explicit cache backend options, overriding [`Self::backend`]
    /// for the cache layer specifically.
    pub fn cache_backend(mut self, options: sessionflow_cache::BackendOptions) -> Self {
        self.cache_backend = Some(options);
        self
    }

    /// Supplies explicit rate-limiter backend options, overriding
    /// [`Self::backend`] for the limiter layer specifically.
    pub fn ratelimit_backend(mut self, options: sessionflow_ratelimit::BackendOptions) -> Self {
        self.ratelimit_backend = Some(options);
        self
    }

    /// Enables response caching by default for every request.
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Enables rate limiting by default for every request.
    pub fn ratelimit(mut self, enabled: bool) -> Self {
        self.ratelimit_enabled = enabled;
        self
    }

    /// Selects the sliding-window algorithm (the default).
    pub fn sliding_window(mut self, window: Duration, limit: usize) -> Self {
        self.algorithm = AlgorithmChoice::SlidingWindow { window, limit };
        self
    }

    /// Selects the fixed-window algorithm.
    pub fn fixed_window(mut self, window: Duration, limit: usize) -> Self {
        self.algorithm = AlgorithmChoice::FixedWindow { window, limit };
        self
    }

    /// Selects the token-bucket algorithm.
    pub fn token_bucket(mut self, capacity: f64, fill_rate: f64) -> Self {
        self.algorithm = AlgorithmChoice::TokenBucket { capacity, fill_rate };
        self
    }

    /// Selects the leaky-bucket algorithm.
    pub fn leaky_bucket(mut self, capacity: f64, leak_rate: f64) -> Self {
        self.algorithm = AlgorithmChoice::LeakyBucket { capacity, leak_rate };
        self
    }

    /// Selects GCRA.
    pub fn gcra(mut self, period: Duration, burst_limit: f64) -> Self {
        self.algorithm = AlgorithmChoice::Gcra { period, burst_limit };
        self
    }

    /// TTL for cached responses. `Duration::ZERO` means no expiration.
    ///
    /// Default: 300s.
    pub fn cache_timeout(mut self, ttl: Duration) -> Self {
        self.cache_timeout = ttl;
        self
    }

    /// How often the in-memory backend sweeps expired entries.
    ///
    /// Default: 15s.
    pub fn check_frequency(mut self, frequency: Duration) -> Self {
        self.check_frequency = frequency;
        self
    }

    /// Keys the rate limiter per scheme+host. Per-host wins if
    /// [`Self::per_endpoint`] is also set (§9 Q3).
    pub fn per_host(mut self, enabled: bool) -> Self {
        self.per_host = enabled;
        self
    }

    /// Keys the rate limiter per scheme+host+path.
    pub fn per_endpoint(mut self, enabled: bool) -> Self {
        self.per_endpoint = enabled;
        self
    }

    /// How long `increment` sleeps between admission polls while waiting.
    ///
    /// Default: 50ms.
    pub fn sleep_duration(mut self, duration: Duration) -> Self {
        self.sleep_duration = duration;
        self
    }

    /// Hard-fails on rate-limit denial or pool exhaustion instead of
    /// waiting or synthesizing a response (§9 Q2).
    ///
    /// Default: disabled.
    pub fn raise_errors(mut self, enabled: bool) -> Self {
        self.raise_errors = enabled;
        self
    }

    /// Zlib-compresses cached response bodies.
    ///
    /// Default: disabled.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    fn resolve_cache_backend(&self) -> Result<sessionflow_cache::BackendOptions, SessionConfigError> {
        if let Some(explicit) = &self.cache_backend {
            return Ok(explicit.clone());
        }
        match self.backend {
            BackendKind::InMemory => Ok(sessionflow_cache::BackendOptions::InMemory(
                sessionflow_pool::InMemoryOptions::new(self.namespace.clone())?
                    .with_cache_timeout(self.cache_timeout)
                    .with_check_frequency(self.check_frequency),
            )),
            BackendKind::Sql => Err(SessionConfigError::BackendOptionsRequired {
                subsystem: "cache",
                backend: "sqlite",
            }),
            BackendKind::Kv => Err(SessionConfigError::BackendOptionsRequired {
                subsystem: "cache",
                backend: "redis",
            }),
        }
    }

    fn resolve_ratelimit_backend(
        &self,
    ) -> Result<sessionflow_ratelimit::BackendOptions, SessionConfigError> {
        if let Some(explicit) = &self.ratelimit_backend {
            return Ok(explicit.clone());
        }
        match self.backend {
            BackendKind::InMemory => Ok(sessionflow_ratelimit::BackendOptions::InMemory(
                sessionflow_pool::InMemoryOptions::new(self.namespace.clone())?
                    .with_cache_timeout(self.cache_timeout)
                    .with_check_frequency(self.check_frequency),
            )),
            BackendKind::Sql => Err(SessionConfigError::BackendOptionsRequired {
                subsystem: "ratelimit",
                backend: "sqlite",
            }),
            BackendKind::Kv => Err(SessionConfigError::BackendOptionsRequired {
                subsystem: "ratelimit",
                backend: "redis",
            }),
        }
    }

    /// Validates the configuration, building the cache and rate-limiter
    /// sub-configs if enabled, and produces a [`SessionConfig`].
    pub fn build(self) -> Result<SessionConfig, SessionConfigError> {
        let cache = if self.cache_enabled {
            let backend = self.resolve_cache_backend()?;
            Some(
                CacheConfigBuilder::new(self.namespace.clone())
                    .backend(backend)
                    .ttl(self.cache_timeout)
                    .compression(self.compression)
                    .renew_cache_on_get(true)
                    .build()?,
            )
        } else {
            None
        };

        let ratelimit = if self.ratelimit_enabled {
            let backend = self.resolve_ratelimit_backend()?;
            let mut builder = RateLimitConfigBuilder::new()
                .name(self.namespace.clone())
                .backend(backend)
                .per_host(self.per_host)
                .per_endpoint(self.per_endpoint)
                .sleep_duration(self.sleep_duration)
                .raise_errors(self.raise_errors);
            builder = match self.algorithm {
                AlgorithmChoice::SlidingWindow { window, limit } => {
                    builder.sliding_window(window, limit)
                }
                AlgorithmChoice::FixedWindow { window, limit } => {
                    builder.fixed_window(window, limit)
                }
                AlgorithmChoice::TokenBucket { capacity, fill_rate } => {
                    builder.token_bucket(capacity, fill_rate)
                }
                AlgorithmChoice::LeakyBucket { capacity, leak_rate } => {
                    builder.leaky_bucket(capacity, leak_rate)
                }
                AlgorithmChoice::Gcra { period, burst_limit } => {
                    builder.gcra(period, burst_limit)
                }
            };
            Some(builder.build()?)
        } else {
            None
        };

        Ok(SessionConfig {
            headers: self.headers,
            http2: self.http2,
            random_user_agents: self.random_user_agents,
            threaded: self.threaded,
            raise_errors: self.raise_errors,
            cache,
            ratelimit,
        })
    }
}
