//! Embedded SQL cache backend: `cache(key TEXT PRIMARY KEY, value BLOB,
//! expiration REAL)`, grounded in `sessions/cache/sqlite.py`'s schema.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension};
use sessionflow_pool::backend::sql::SqlPool;

use crate::error::CacheError;

pub struct SqlBackend {
    pool: Arc<SqlPool>,
    handle: Arc<()>,
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl SqlBackend {
    pub fn new(pool: Arc<SqlPool>) -> Result<Self, CacheError> {
        let conn = pool.acquire(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expiration REAL
            )",
            [],
        )
        .map_err(sessionflow_pool::PoolError::Sqlite)?;
        drop(conn);
        let handle = pool.clone_handle();
        Ok(SqlBackend { pool, handle })
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let pool = self.pool.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute("DELETE FROM cache WHERE expiration IS NOT NULL AND expiration < ?1", params![now_epoch_secs()])
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM cache WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            Ok(value)
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let pool = self.pool.clone();
        let key = key.to_string();
        let expiration = if ttl.is_zero() {
            None
        } else {
            Some(now_epoch_secs() + ttl.as_secs_f64())
        };
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute(
                "INSERT OR REPLACE INTO cache (key, value, expiration) VALUES (?1, ?2, ?3)",
                params![key, value, expiration],
            )
            .map_err(sessionflow_pool::PoolError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }

    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let pool = self.pool.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute("DELETE FROM cache WHERE key = ?1", params![key])
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }

    pub async fn keys(&self, suffix: &str) -> Result<Vec<String>, CacheError> {
        let pool = self.pool.clone();
        let suffix = suffix.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute("DELETE FROM cache WHERE expiration IS NOT NULL AND expiration < ?1", params![now_epoch_secs()])
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            let mut stmt = conn
                .prepare("SELECT key FROM cache")
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(sessionflow_pool::PoolError::Sqlite)?;
            let mut keys = Vec::new();
            for row in rows {
                let k = row.map_err(sessionflow_pool::PoolError::Sqlite)?;
                if k.ends_with(&suffix) {
                    keys.push(k);
                }
            }
            Ok(keys)
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }

    pub async fn clear(&self, suffix: &str) -> Result<(), CacheError> {
        let pool = self.pool.clone();
        let suffix = suffix.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute(
                "DELETE FROM cache WHERE key LIKE '%' || ?1",
                params![suffix],
            )
            .map_err(sessionflow_pool::PoolError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }

    pub async fn renew(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let pool = self.pool.clone();
        let key = key.to_string();
        let expiration = if ttl.is_zero() {
            None
        } else {
            Some(now_epoch_secs() + ttl.as_secs_f64())
        };
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute(
                "UPDATE cache SET expiration = ?1 WHERE key = ?2",
                params![expiration, key],
            )
            .map_err(sessionflow_pool::PoolError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::Serde(e.to_string()))?
    }
}

impl Drop for SqlBackend {
    fn drop(&mut self) {
        // Release this backend's claim before asking the registry whether
        // the pool has become unreferenced, so the refcount check below
        // already reflects this drop.
        drop(std::mem::replace(&mut self.handle, Arc::new(())));
        sessionflow_pool::registry::release_sql_pool(self.pool.options());
    }
}
