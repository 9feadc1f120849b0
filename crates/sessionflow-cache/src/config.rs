//! Configuration for the cache layer: a fluent builder over the three
//! backend option shapes plus the cache-specific knobs (TTL, compression,
//! renew-on-get), following this workspace's existing config-builder shape.

use sessionflow_core::{EventListeners, FnListener};
use sessionflow_pool::InMemoryOptions;
use std::time::Duration;

use crate::error::CacheError;
use crate::events::CacheEvent;

/// Which backend a [`crate::Cache`] is backed by, carrying that backend's
/// validated options.
#[derive(Debug, Clone)]
pub enum BackendOptions {
    InMemory(InMemoryOptions),
    #[cfg(feature = "sqlite")]
    Sql(sessionflow_pool::SqlOptions),
    #[cfg(feature = "redis-backend")]
    Kv(sessionflow_pool::KvOptions),
}

/// Validated, immutable cache configuration.
pub struct CacheConfig {
    pub(crate) namespace: String,
    pub(crate) backend: BackendOptions,
    pub(crate) ttl: Duration,
    pub(crate) compression: bool,
    pub(crate) renew_on_get: bool,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    namespace: String,
    backend: Option<BackendOptions>,
    ttl: Duration,
    compression: bool,
    renew_on_get: bool,
    event_listeners: EventListeners<CacheEvent>,
}

impl CacheConfigBuilder {
    /// Creates a new builder with default values: no TTL expiry, no
    /// compression, `renew_cache_on_get` disabled.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            backend: None,
            ttl: Duration::ZERO,
            compression: false,
            renew_on_get: false,
            event_listeners: EventListeners::new(),
        }
    }

    /// Selects the backend and its validated options.
    pub fn backend(mut self, backend: BackendOptions) -> Self {
        self.backend = Some(backend);
        self
    }

    /// TTL for stored entries. `Duration::ZERO` means no expiration.
    ///
    /// Default: no expiration.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enables zlib compression of the serialized response body before
    /// storage.
    ///
    /// Default: disabled.
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Whether a `get` hit renews the entry's TTL (§9 Q4: extended
    /// uniformly to all three backends).
    ///
    /// Default: disabled.
    pub fn renew_cache_on_get(mut self, enabled: bool) -> Self {
        self.renew_on_get = enabled;
        self
    }

    /// Registers a callback invoked on every cache hit.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if let CacheEvent::Hit { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback invoked on every cache miss.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &CacheEvent| {
            if let CacheEvent::Miss { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Validates the configuration and produces a [`CacheConfig`].
    pub fn build(self) -> Result<CacheConfig, CacheError> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => BackendOptions::InMemory(InMemoryOptions::new(self.namespace.clone())?),
        };

        Ok(CacheConfig {
            namespace: self.namespace,
            backend,
            ttl: self.ttl,
            compression: self.compression,
            renew_on_get: self.renew_on_get,
            event_listeners: self.event_listeners,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_in_memory_backend_with_no_ttl() {
        let config = CacheConfigBuilder::new("test").build().unwrap();
        assert_eq!(config.ttl, Duration::ZERO);
        assert!(matches!(config.backend, BackendOptions::InMemory(_)));
    }

    #[test]
    fn builder_applies_ttl_and_compression() {
        let config = CacheConfigBuilder::new("test")
            .ttl(Duration::from_secs(60))
            .compression(true)
            .build()
            .unwrap();
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert!(config.compression);
    }
}
