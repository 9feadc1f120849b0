//! Remote key/value cache backend: `SETEX`-based storage against a shared
//! [`sessionflow_pool::backend::kv::KvPool`].

use std::sync::Arc;
use std::time::Duration;

use redis::AsyncCommands;
use sessionflow_pool::backend::kv::KvPool;

use crate::error::CacheError;

pub struct KvBackend {
    pool: Arc<KvPool>,
    handle: Arc<()>,
}

impl KvBackend {
    pub fn new(pool: Arc<KvPool>) -> Self {
        let handle = pool.clone_handle();
        KvBackend { pool, handle }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.acquire();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.acquire();
        if ttl.is_zero() {
            let () = conn
                .set(key, value)
                .await
                .map_err(sessionflow_pool::PoolError::Redis)?;
        } else {
            let secs = ttl.as_secs().max(1);
            let () = conn
                .set_ex(key, value, secs)
                .await
                .map_err(sessionflow_pool::PoolError::Redis)?;
        }
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.acquire();
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(exists)
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.acquire();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(())
    }

    pub async fn keys(&self, suffix: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.pool.acquire();
        let all: Vec<String> = conn
            .keys(format!("*{suffix}"))
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(all)
    }

    pub async fn clear(&self, suffix: &str) -> Result<(), CacheError> {
        let keys = self.keys(suffix).await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.acquire();
        let _: i64 = conn
            .del(keys)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(())
    }

    /// Renews TTL on a hit by re-issuing `EXPIRE`.
    pub async fn renew(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let mut conn = self.pool.acquire();
        let _: bool = conn
            .expire(key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;
        Ok(())
    }
}

impl Drop for KvBackend {
    fn drop(&mut self) {
        drop(std::mem::replace(&mut self.handle, Arc::new(())));
        sessionflow_pool::registry::release_kv_pool(self.pool.options());
    }
}
