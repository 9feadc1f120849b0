//! Configuration for the rate-limiter layer: algorithm selection, key
//! granularity, backend options, and the wait/fail-fast knobs, following
//! this workspace's existing config-builder shape.

use std::time::Duration;

use sessionflow_core::{EventListeners, FnListener};
use sessionflow_pool::InMemoryOptions;

use crate::algorithm::{Algorithm, AlgorithmParams};
use crate::error::RateLimitError;
use crate::events::RateLimitEvent;

/// Which backend a [`crate::RateLimiter`] stores its per-key state in.
#[derive(Debug, Clone)]
pub enum BackendOptions {
    InMemory(InMemoryOptions),
    #[cfg(feature = "sqlite")]
    Sql(sessionflow_pool::SqlOptions),
    #[cfg(feature = "redis-backend")]
    Kv(sessionflow_pool::KvOptions),
}

/// How the request URL contributes to the rate-limit key (§4.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// The URL contributes nothing; every request shares one key.
    Global,
    /// Scheme + host.
    PerHost,
    /// Scheme + host + path.
    PerEndpoint,
}

/// Validated, immutable rate-limiter configuration.
pub struct RateLimitConfig {
    pub(crate) name: String,
    pub(crate) algorithm: Algorithm,
    pub(crate) params: AlgorithmParams,
    pub(crate) backend: BackendOptions,
    pub(crate) key_scope: KeyScope,
    pub(crate) sleep_duration: Duration,
    pub(crate) timeout: Option<Duration>,
    pub(crate) raise_errors: bool,
    pub(crate) event_listeners: EventListeners<RateLimitEvent>,
}

/// Builder for [`RateLimitConfig`].
pub struct RateLimitConfigBuilder {
    name: String,
    algorithm: Algorithm,
    params: AlgorithmParams,
    backend: Option<BackendOptions>,
    per_host: bool,
    per_endpoint: bool,
    sleep_duration: Duration,
    timeout: Option<Duration>,
    raise_errors: bool,
    event_listeners: EventListeners<RateLimitEvent>,
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitConfigBuilder {
    /// Creates a new builder: sliding window, limit=50/1s, global key scope,
    /// no hard timeout, `raise_errors` disabled.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            algorithm: Algorithm::SlidingWindow,
            params: AlgorithmParams::window(Duration::from_secs(1), 50),
            backend: None,
            per_host: false,
            per_endpoint: false,
            sleep_duration: Duration::from_millis(50),
            timeout: None,
            raise_errors: false,
            event_listeners: EventListeners::new(),
        }
    }

    /// Names this limiter instance (used in events and table/key naming).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Selects the sliding-window algorithm.
    pub fn sliding_window(mut self, window: Duration, limit: usize) -> Self {
        self.algorithm = Algorithm::SlidingWindow;
        self.params = AlgorithmParams::window(window, limit);
        self
    }

    /// Selects the fixed-window algorithm.
    pub fn fixed_window(mut self, window: Duration, limit: usize) -> Self {
        self.algorithm = Algorithm::FixedWindow;
        self.params = AlgorithmParams::window(window, limit);
        self
    }

    /// Selects the cheaper sliding-window-counter approximation. Not one of
    /// the five contractual algorithms; only reachable here, never via the
    /// `type` string in §6.
    pub fn sliding_window_counter(mut self, window: Duration, limit: usize) -> Self {
        self.algorithm = Algorithm::SlidingWindowCounter;
        self.params = AlgorithmParams::window(window, limit);
        self
    }

    /// Selects the token-bucket algorithm.
    pub fn token_bucket(mut self, capacity: f64, fill_rate: f64) -> Self {
        self.algorithm = Algorithm::TokenBucket;
        self.params = AlgorithmParams::bucket(capacity, fill_rate);
        self
    }

    /// Selects the leaky-bucket algorithm.
    pub fn leaky_bucket(mut self, capacity: f64, leak_rate: f64) -> Self {
        self.algorithm = Algorithm::LeakyBucket;
        self.params = AlgorithmParams::bucket(capacity, leak_rate);
        self
    }

    /// Selects GCRA.
    pub fn gcra(mut self, period: Duration, burst_limit: f64) -> Self {
        self.algorithm = Algorithm::Gcra;
        self.params = AlgorithmParams::gcra(period, burst_limit);
        self
    }

    /// Selects the algorithm and its params by the canonical `type` string
    /// plus its documented aliases (§6).
    pub fn algorithm_named(
        mut self,
        name: &str,
        params: AlgorithmParams,
    ) -> Result<Self, RateLimitError> {
        self.algorithm = name.parse()?;
        self.params = params;
        Ok(self)
    }

    /// Selects the backend and its validated options.
    pub fn backend(mut self, backend: BackendOptions) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Keys per scheme+host. If both this and [`Self::per_endpoint`] are
    /// set, per-host wins (§9 Q3).
    pub fn per_host(mut self, enabled: bool) -> Self {
        self.per_host = enabled;
        self
    }

    /// Keys per scheme+host+path. Overridden by [`Self::per_host`] if both
    /// are set (§9 Q3).
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

    /// Caps the total time `increment` will wait for admission. `None`
    /// (the default) waits indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Hard-fails every denial/exhaustion instead of waiting (§9 Q2: applied
    /// consistently to every failure path, not just some).
    ///
    /// Default: disabled.
    pub fn raise_errors(mut self, enabled: bool) -> Self {
        self.raise_errors = enabled;
        self
    }

    /// Registers a callback invoked on every admission.
    pub fn on_admitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &RateLimitEvent| {
            if let RateLimitEvent::Admitted { key, wait_duration, .. } = event {
                f(key, *wait_duration);
            }
        }));
        self
    }

    /// Registers a callback invoked on every denial.
    pub fn on_denied<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &RateLimitEvent| {
            if let RateLimitEvent::Denied { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Resolves the effective [`KeyScope`] per §9 Q3 (per-host wins if both
    /// flags are set).
    fn key_scope(&self) -> KeyScope {
        if self.per_host {
            KeyScope::PerHost
        } else if self.per_endpoint {
            KeyScope::PerEndpoint
        } else {
            KeyScope::Global
        }
    }

    /// Validates the configuration and produces a [`RateLimitConfig`].
    pub fn build(self) -> Result<RateLimitConfig, RateLimitError> {
        let key_scope = self.key_scope();
        let backend = match self.backend {
            Some(backend) => backend,
            None => BackendOptions::InMemory(InMemoryOptions::new(self.name.clone())?),
        };

        Ok(RateLimitConfig {
            name: self.name,
            algorithm: self.algorithm,
            params: self.params,
            backend,
            key_scope,
            sleep_duration: self.sleep_duration,
            timeout: self.timeout,
            raise_errors: self.raise_errors,
            event_listeners: self.event_listeners,
        })
    }
}
