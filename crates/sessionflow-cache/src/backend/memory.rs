//! In-memory cache backend: a thin wrapper over [`sessionflow_pool`]'s
//! shared mapping.

use std::sync::Arc;
use std::time::Duration;

use sessionflow_pool::backend::memory::InMemoryPool;

use crate::error::CacheError;

pub struct MemoryBackend {
    pool: Arc<InMemoryPool>,
}

impl MemoryBackend {
    pub fn new(pool: Arc<InMemoryPool>) -> Self {
        MemoryBackend { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.pool.get(key)?)
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let ttl = if ttl.is_zero() { None } else { Some(ttl) };
        Ok(self.pool.set(key, value, ttl)?)
    }

    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.pool.contains(key)?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        Ok(self.pool.delete(key)?)
    }

    pub async fn keys(&self, suffix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.pool.keys_with_suffix(suffix)?)
    }

    pub async fn clear(&self, suffix: &str) -> Result<(), CacheError> {
        Ok(self.pool.clear_namespace(suffix)?)
    }

    /// Renews a key's TTL on a hit (§9 Q4), by rewriting the entry with the
    /// same value and a fresh expiration.
    pub async fn renew(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.set(key, value, ttl).await
    }
}
