//! Response caching for sessionflow (C4): a direct capability API —
//! `contains`/`get`/`set`/`delete`/`keys`/`values`/`items`/`clear` — backed
//! by whichever of the three shared pools the caller configured.
//!
//! Unlike a Tower middleware wrapping an arbitrary inner `Service`, this
//! cache is consumed directly by the session orchestrator: it knows its
//! values are [`sessionflow_response::Response`] records, and the namespace
//! key always carries a `"cache"` suffix so its entries never collide with
//! the rate limiter's in a shared in-memory pool.

mod backend;
mod config;
mod error;
mod events;

pub use config::{BackendOptions, CacheConfig, CacheConfigBuilder};
pub use error::CacheError;
pub use events::CacheEvent;

use std::io::{Read, Write};
use std::time::Instant;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sessionflow_core::keys::join_key;
use sessionflow_pool::{registry, BackendKind};
use sessionflow_response::Response;

use backend::memory::MemoryBackend;
#[cfg(feature = "redis-backend")]
use backend::kv::KvBackend;
#[cfg(feature = "sqlite")]
use backend::sql::SqlBackend;

const SUFFIX: &str = "cache";

enum Backend {
    Memory(MemoryBackend),
    #[cfg(feature = "sqlite")]
    Sql(SqlBackend),
    #[cfg(feature = "redis-backend")]
    Kv(KvBackend),
}

/// A response cache bound to one namespace and one backend.
pub struct Cache {
    config: CacheConfig,
    backend: Backend,
}

impl Cache {
    /// Builds a cache from validated configuration, resolving (or creating)
    /// the shared backend pool for the configured options.
    pub async fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let backend = match &config.backend {
            BackendOptions::InMemory(opts) => {
                Backend::Memory(MemoryBackend::new(registry::memory_pool(opts.clone())))
            }
            #[cfg(feature = "sqlite")]
            BackendOptions::Sql(opts) => {
                let pool = registry::sql_pool(opts.clone());
                Backend::Sql(SqlBackend::new(pool)?)
            }
            #[cfg(feature = "redis-backend")]
            BackendOptions::Kv(opts) => {
                let pool = registry::kv_pool(opts.clone()).await?;
                Backend::Kv(KvBackend::new(pool))
            }
        };
        Ok(Cache { config, backend })
    }

    fn full_key(&self, key: &str) -> String {
        if key.ends_with(&format!(":{SUFFIX}")) || key == SUFFIX {
            key.to_string()
        } else {
            join_key(&[&self.config.namespace, key], SUFFIX)
        }
    }

    fn compress(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        if !self.config.compression {
            return Ok(bytes);
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&bytes)
            .map_err(|e| CacheError::Serde(e.to_string()))?;
        encoder.finish().map_err(|e| CacheError::Serde(e.to_string()))
    }

    fn decompress(&self, bytes: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        if !self.config.compression {
            return Ok(bytes);
        }
        let mut decoder = ZlibDecoder::new(&bytes[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CacheError::Serde(e.to_string()))?;
        Ok(out)
    }

    /// Returns the cached response for `key`, if present and unexpired.
    /// Marks the returned [`Response`] as `is_cached`. Emits `Hit`/`Miss`.
    pub async fn get(&self, key: &str) -> Result<Option<Response>, CacheError> {
        let full_key = self.full_key(key);
        let raw = match &self.backend {
            Backend::Memory(b) => b.get(&full_key).await?,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.get(&full_key).await?,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.get(&full_key).await?,
        };

        let Some(raw) = raw else {
            self.config.event_listeners.emit(&CacheEvent::Miss {
                key: full_key,
                timestamp: Instant::now(),
            });
            return Ok(None);
        };

        let decompressed = self.decompress(raw)?;
        let value: serde_json::Value = serde_json::from_slice(&decompressed)
            .map_err(|e| CacheError::Serde(e.to_string()))?;
        let mut response = Response::deserialize(value)?;
        response.set_is_cached(true);

        if self.config.renew_on_get {
            self.renew(&full_key).await?;
        }

        self.config.event_listeners.emit(&CacheEvent::Hit {
            key: full_key,
            timestamp: Instant::now(),
        });
        Ok(Some(response))
    }

    async fn renew(&self, full_key: &str) -> Result<(), CacheError> {
        match &self.backend {
            Backend::Memory(b) => {
                if let Some(raw) = b.get(full_key).await? {
                    b.renew(full_key, raw, self.config.ttl).await
                } else {
                    Ok(())
                }
            }
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.renew(full_key, self.config.ttl).await,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.renew(full_key, self.config.ttl).await,
        }
    }

    /// Stores `response` under `key`, replacing any existing entry. Emits
    /// `Stored`.
    pub async fn set(&self, key: &str, response: &Response) -> Result<(), CacheError> {
        let full_key = self.full_key(key);
        let value = response.serialize();
        let bytes = serde_json::to_vec(&value).map_err(|e| CacheError::Serde(e.to_string()))?;
        let bytes = self.compress(bytes)?;

        match &self.backend {
            Backend::Memory(b) => b.set(&full_key, bytes, self.config.ttl).await?,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.set(&full_key, bytes, self.config.ttl).await?,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.set(&full_key, bytes, self.config.ttl).await?,
        }

        self.config.event_listeners.emit(&CacheEvent::Stored {
            key: full_key,
            timestamp: Instant::now(),
        });
        Ok(())
    }

    /// `true` iff `key` has a live, unexpired entry.
    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let full_key = self.full_key(key);
        match &self.backend {
            Backend::Memory(b) => b.contains(&full_key).await,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.contains(&full_key).await,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.contains(&full_key).await,
        }
    }

    /// Removes `key`'s entry, if present. Emits `Evicted`.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let full_key = self.full_key(key);
        match &self.backend {
            Backend::Memory(b) => b.delete(&full_key).await?,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.delete(&full_key).await?,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.delete(&full_key).await?,
        }
        self.config.event_listeners.emit(&CacheEvent::Evicted {
            key: full_key,
            timestamp: Instant::now(),
        });
        Ok(())
    }

    /// All live keys in this cache's namespace, with the namespace prefix
    /// and `:cache` suffix stripped back to the caller-visible form.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let raw = match &self.backend {
            Backend::Memory(b) => b.keys(SUFFIX).await?,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.keys(SUFFIX).await?,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.keys(SUFFIX).await?,
        };
        let prefix = format!("{}:", self.config.namespace);
        Ok(raw
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| {
                let stripped = k.trim_start_matches(&prefix);
                stripped
                    .strip_suffix(&format!(":{SUFFIX}"))
                    .unwrap_or(stripped)
                    .to_string()
            })
            .collect())
    }

    /// All live responses in this cache's namespace.
    pub async fn values(&self) -> Result<Vec<Response>, CacheError> {
        let mut out = Vec::new();
        for key in self.keys().await? {
            if let Some(response) = self.get(&key).await? {
                out.push(response);
            }
        }
        Ok(out)
    }

    /// All live `(key, response)` pairs in this cache's namespace.
    pub async fn items(&self) -> Result<Vec<(String, Response)>, CacheError> {
        let mut out = Vec::new();
        for key in self.keys().await? {
            if let Some(response) = self.get(&key).await? {
                out.push((key, response));
            }
        }
        Ok(out)
    }

    /// Removes every entry in this cache's namespace. Emits `Cleared`.
    ///
    /// The backend's own suffix-based clear isn't namespace-aware by itself
    /// (a SQL or KV pool may be shared by caches with different namespaces),
    /// so this deletes each of this namespace's keys individually rather
    /// than delegating to the pool's bulk clear.
    pub async fn clear(&self) -> Result<(), CacheError> {
        for key in self.keys().await? {
            self.delete_quiet(&key).await?;
        }
        self.config.event_listeners.emit(&CacheEvent::Cleared {
            timestamp: Instant::now(),
        });
        Ok(())
    }

    async fn delete_quiet(&self, key: &str) -> Result<(), CacheError> {
        let full_key = self.full_key(key);
        match &self.backend {
            Backend::Memory(b) => b.delete(&full_key).await,
            #[cfg(feature = "sqlite")]
            Backend::Sql(b) => b.delete(&full_key).await,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(b) => b.delete(&full_key).await,
        }
    }

    /// Which backend kind this cache is currently using.
    pub fn backend_kind(&self) -> BackendKind {
        match &self.backend {
            Backend::Memory(_) => BackendKind::InMemory,
            #[cfg(feature = "sqlite")]
            Backend::Sql(_) => BackendKind::Sql,
            #[cfg(feature = "redis-backend")]
            Backend::Kv(_) => BackendKind::Kv,
        }
    }
}
