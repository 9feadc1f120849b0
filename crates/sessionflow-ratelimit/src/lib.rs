//! Rate-limiter layer (C5): five contractual admission algorithms, each a
//! pure state machine in [`algorithm`], replayed across three pluggable
//! backends. Exposed as a direct `increment` capability consulted by the
//! session orchestrator rather than Tower middleware — the same
//! architectural departure documented for `sessionflow-cache`, since a rate
//! limiter gating an arbitrary request pipeline isn't a `Req -> Resp`
//! service either.

mod algorithm;
mod backend;
mod config;
mod error;
mod events;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sessionflow_core::keys::join_key;
use sessionflow_core::Waiter;
use sessionflow_pool::BackendKind;

pub use algorithm::{AlgoState, Admission, Algorithm, AlgorithmParams};
pub use config::{BackendOptions, KeyScope, RateLimitConfig, RateLimitConfigBuilder};
pub use error::RateLimitError;
pub use events::RateLimitEvent;

use backend::memory::MemoryBackend;
#[cfg(feature = "redis-backend")]
use backend::kv::KvBackend;
#[cfg(feature = "sqlite")]
use backend::sql::SqlBackend;

const SUFFIX: &str = "ratelimit";

enum Backend {
    Memory(MemoryBackend),
    #[cfg(feature = "sqlite")]
    Sql(SqlBackend),
    #[cfg(feature = "redis-backend")]
    Kv(KvBackend),
}

/// A configured rate limiter: one algorithm, one backend, one key scope.
pub struct RateLimiter {
    config: RateLimitConfig,
    backend: Backend,
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl RateLimiter {
    pub async fn new(config: RateLimitConfig) -> Result<Self, RateLimitError> {
        let backend = match &config.backend {
            BackendOptions::InMemory(opts) => Backend::Memory(MemoryBackend::new(
                sessionflow_pool::registry::memory_pool(opts.clone()),
            )),
            #[cfg(feature = "sqlite")]
            BackendOptions::Sql(opts) => Backend::Sql(SqlBackend::new(
                sessionflow_pool::registry::sql_pool(opts.clone()),
            )?),
            #[cfg(feature = "redis-backend")]
            BackendOptions::Kv(opts) => Backend::Kv(KvBackend::new(
                sessionflow_pool::registry::kv_pool(opts.clone()).await?,
            )),
        };
        Ok(RateLimiter { config, backend })
    }

    pub fn backend_kind(&self) -> BackendKind {
        match &self.config.backend {
            BackendOptions::InMemory(_) => BackendKind::InMemory,
            #[cfg(feature = "sqlite")]
            BackendOptions::Sql(_) => BackendKind::Sql,
            #[cfg(feature = "redis-backend")]
            BackendOptions::Kv(_) => BackendKind::Kv,
        }
    }

    /// Derives the rate-limit key for a request (§4.5.2): colon-joined
    /// non-empty components ending in `"ratelimit"`. `url` is only
    /// consulted when the configured key scope is per-host or
    /// per-endpoint.
    pub fn key_for(&self, url: Option<&url::Url>, extra_keys: &[&str]) -> String {
        let url_component = match (self.config.key_scope, url) {
            (KeyScope::Global, _) | (_, None) => String::new(),
            (KeyScope::PerHost, Some(u)) => {
                format!("{}://{}", u.scheme(), u.host_str().unwrap_or(""))
            }
            (KeyScope::PerEndpoint, Some(u)) => {
                format!("{}://{}{}", u.scheme(), u.host_str().unwrap_or(""), u.path())
            }
        };
        let mut components: Vec<&str> = vec![&self.config.name];
        if !url_component.is_empty() {
            components.push(&url_component);
        }
        components.extend(extra_keys.iter().copied());
        join_key(&components, SUFFIX)
    }

    async fn try_admit(&self, key: &str) -> Result<Admission, RateLimitError> {
        let now = now_epoch_secs();
        match &self.backend {
            Backend::Memory(b) => {
                b.try_admit(key, self.config.algorithm, &self.config.params, now, self.ttl())
                    .await
            }
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => {
                b.try_admit(key, self.config.algorithm, self.config.params, now, self.ttl())
                    .await
            }
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => {
                b.try_admit(key, self.config.algorithm, &self.config.params, now)
                    .await
            }
        }
    }

    fn ttl(&self) -> Duration {
        match &self.config.backend {
            BackendOptions::InMemory(opts) => opts.cache_timeout,
            #[cfg(feature = "sqlite")]
            BackendOptions::Sql(_) => Duration::ZERO,
            #[cfg(feature = "redis-backend")]
            BackendOptions::Kv(opts) => opts.cache_timeout,
        }
    }

    /// Consults admission for `key`, waiting via `waiter` on denial until
    /// admitted, a configured timeout elapses, or failing fast if
    /// `raise_errors` is set (§9 Q2: every denial/failure path is raised
    /// consistently once that flag is on, not just some of them).
    ///
    /// Per §9 Q1, admission is only ever recorded inside the backend's own
    /// atomic `try_admit`; if this future is dropped mid-wait no admission
    /// was consumed, so cancellation never leaves a phantom slot taken.
    pub async fn increment(&self, key: &str, waiter: &dyn Waiter) -> Result<(), RateLimitError> {
        let start = Instant::now();
        loop {
            let admission = self.try_admit(key).await?;
            if admission.admitted {
                self.emit(RateLimitEvent::Admitted {
                    key: key.to_string(),
                    wait_duration: start.elapsed(),
                    timestamp: Instant::now(),
                });
                return Ok(());
            }

            self.emit(RateLimitEvent::Denied {
                key: key.to_string(),
                timestamp: Instant::now(),
            });

            if self.config.raise_errors {
                return Err(RateLimitError::Exceeded {
                    retry_after: admission.retry_after,
                });
            }

            if let Some(timeout) = self.config.timeout {
                if start.elapsed() >= timeout {
                    return Err(RateLimitError::Exceeded {
                        retry_after: admission.retry_after,
                    });
                }
            }

            waiter.wait(self.config.sleep_duration).await;
        }
    }

    fn emit(&self, event: RateLimitEvent) {
        self.config.event_listeners.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionflow_core::waiter::CooperativeWaiter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn limiter(config: RateLimitConfig) -> RateLimiter {
        RateLimiter::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn increment_admits_then_waits_out_the_window() {
        let config = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_millis(50), 1)
            .sleep_duration(Duration::from_millis(5))
            .build()
            .unwrap();
        let rl = limiter(config).await;
        rl.increment("k", &CooperativeWaiter).await.unwrap();
        let start = Instant::now();
        rl.increment("k", &CooperativeWaiter).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn raise_errors_fails_fast_on_denial() {
        let config = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_secs(5), 1)
            .raise_errors(true)
            .build()
            .unwrap();
        let rl = limiter(config).await;
        rl.increment("k", &CooperativeWaiter).await.unwrap();
        let result = rl.increment("k", &CooperativeWaiter).await;
        assert!(matches!(result, Err(RateLimitError::Exceeded { .. })));
    }

    #[tokio::test]
    async fn timeout_fails_after_the_configured_wait() {
        let config = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_secs(5), 1)
            .sleep_duration(Duration::from_millis(5))
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        let rl = limiter(config).await;
        rl.increment("k", &CooperativeWaiter).await.unwrap();
        let result = rl.increment("k", &CooperativeWaiter).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn events_fire_on_admission_and_denial() {
        let admitted = Arc::new(AtomicUsize::new(0));
        let denied = Arc::new(AtomicUsize::new(0));
        let a = admitted.clone();
        let d = denied.clone();
        let config = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_secs(5), 1)
            .raise_errors(true)
            .on_admitted(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_denied(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();
        let rl = limiter(config).await;
        rl.increment("k", &CooperativeWaiter).await.unwrap();
        let _ = rl.increment("k", &CooperativeWaiter).await;
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(denied.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn per_host_wins_when_both_scope_flags_are_set() {
        let config = RateLimitConfigBuilder::new()
            .per_host(true)
            .per_endpoint(true)
            .name("svc")
            .build()
            .unwrap();
        assert_eq!(config.key_scope, KeyScope::PerHost);
    }

    #[tokio::test]
    async fn key_for_differs_by_host_under_per_host_scope() {
        let config = RateLimitConfigBuilder::new().per_host(true).build().unwrap();
        let rl = limiter(config).await;
        let a = url::Url::parse("https://a.example.com/x").unwrap();
        let b = url::Url::parse("https://b.example.com/y").unwrap();
        assert_ne!(rl.key_for(Some(&a), &[]), rl.key_for(Some(&b), &[]));
    }

    #[tokio::test]
    async fn key_for_is_stable_across_paths_under_per_host_scope() {
        let config = RateLimitConfigBuilder::new().per_host(true).build().unwrap();
        let rl = limiter(config).await;
        let a = url::Url::parse("https://a.example.com/x").unwrap();
        let b = url::Url::parse("https://a.example.com/y").unwrap();
        assert_eq!(rl.key_for(Some(&a), &[]), rl.key_for(Some(&b), &[]));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn dropping_the_last_sql_limiter_tears_its_pool_down() {
        use sessionflow_pool::{registry, SqlOptions};

        let path = std::env::temp_dir().join("sessionflow-ratelimit-teardown-test.db");
        let _ = std::fs::remove_file(&path);
        let sql_opts = SqlOptions::new(path).unwrap();

        let config_a = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_secs(5), 1)
            .backend(BackendOptions::Sql(sql_opts.clone()))
            .build()
            .unwrap();
        let rl_a = limiter(config_a).await;

        let config_b = RateLimitConfigBuilder::new()
            .fixed_window(Duration::from_secs(5), 1)
            .backend(BackendOptions::Sql(sql_opts.clone()))
            .build()
            .unwrap();
        let rl_b = limiter(config_b).await;

        let pool = registry::sql_pool(sql_opts.clone());
        assert_eq!(pool.referent_count(), 3); // the pool's own handle + rl_a's + rl_b's

        drop(rl_a);
        assert_eq!(pool.referent_count(), 2, "rl_b still shares the pool");

        drop(rl_b);
        assert_eq!(pool.referent_count(), 1, "only our local handle remains");

        let pool_after = registry::sql_pool(sql_opts);
        assert!(
            !std::sync::Arc::ptr_eq(&pool, &pool_after),
            "the torn-down pool should be replaced by a fresh one on next lookup"
        );
    }
}
