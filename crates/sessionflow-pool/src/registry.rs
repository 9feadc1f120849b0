//! The process-wide pool registry (C3): keyed by (backend-kind,
//! options-identity), lookup-or-create is atomic under a single mutex, pool
//! operations themselves run outside that mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::backend::memory::InMemoryPool;
use crate::options::InMemoryOptions;

#[cfg(feature = "sqlite")]
use crate::backend::sql::SqlPool;
#[cfg(feature = "sqlite")]
use crate::options::SqlOptions;

#[cfg(feature = "redis-backend")]
use crate::backend::kv::KvPool;
#[cfg(feature = "redis-backend")]
use crate::error::PoolError;
#[cfg(feature = "redis-backend")]
use crate::options::KvOptions;

struct Registry {
    memory: Mutex<HashMap<String, Arc<InMemoryPool>>>,
    #[cfg(feature = "sqlite")]
    sql: Mutex<HashMap<String, Arc<SqlPool>>>,
    #[cfg(feature = "redis-backend")]
    kv: Mutex<HashMap<String, Arc<KvPool>>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        memory: Mutex::new(HashMap::new()),
        #[cfg(feature = "sqlite")]
        sql: Mutex::new(HashMap::new()),
        #[cfg(feature = "redis-backend")]
        kv: Mutex::new(HashMap::new()),
    })
}

/// Returns the canonical [`InMemoryPool`] for `options`, creating it on
/// first use. Every session constructed with the same namespace shares the
/// same underlying mapping.
pub fn memory_pool(options: InMemoryOptions) -> Arc<InMemoryPool> {
    let key = options.identity();
    let mut pools = registry().memory.lock().unwrap();
    pools
        .entry(key)
        .or_insert_with(|| Arc::new(InMemoryPool::new(options)))
        .clone()
}

#[cfg(feature = "sqlite")]
/// Returns the canonical [`SqlPool`] for `options`, creating it on first
/// use.
pub fn sql_pool(options: SqlOptions) -> Arc<SqlPool> {
    let key = options.identity();
    let mut pools = registry().sql.lock().unwrap();
    pools
        .entry(key)
        .or_insert_with(|| Arc::new(SqlPool::new(options)))
        .clone()
}

#[cfg(feature = "sqlite")]
/// Releases one consumer's claim on the [`SqlPool`] for `options` (§4.3: a
/// pool's refcount reaching zero tears the backend down). Called once per
/// consumer as it drops its handle; only the last one actually drains the
/// pool's connections and removes it from the registry, so the pool stays
/// alive for as long as any other session shares the same options.
pub fn release_sql_pool(options: &SqlOptions) {
    let key = options.identity();
    let mut pools = registry().sql.lock().unwrap();
    if let Some(pool) = pools.get(&key) {
        if pool.referent_count() == 1 {
            pool.close();
            pools.remove(&key);
        }
    }
}

#[cfg(feature = "redis-backend")]
/// Returns the canonical [`KvPool`] for `options`, connecting on first use.
/// Unlike the other two backends this requires an async context because
/// establishing the connection is itself async.
pub async fn kv_pool(options: KvOptions) -> Result<Arc<KvPool>, PoolError> {
    let key = options.identity();
    // The connect happens outside the registry mutex so a slow connect to
    // one server can't block lookups for unrelated options.
    if let Some(existing) = registry().kv.lock().unwrap().get(&key) {
        return Ok(existing.clone());
    }
    let pool = Arc::new(KvPool::connect(options).await?);
    let mut pools = registry().kv.lock().unwrap();
    Ok(pools.entry(key).or_insert(pool).clone())
}

#[cfg(feature = "redis-backend")]
/// Releases one consumer's claim on the [`KvPool`] for `options`, mirroring
/// [`release_sql_pool`]: only the last consumer actually drops the pool
/// (signalling the remote server by closing its connection) and removes it
/// from the registry.
pub fn release_kv_pool(options: &KvOptions) {
    let key = options.identity();
    let mut pools = registry().kv.lock().unwrap();
    if let Some(pool) = pools.get(&key) {
        if pool.referent_count() == 1 {
            pools.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_identity_returns_the_same_memory_pool() {
        let a = memory_pool(InMemoryOptions::new("shared").unwrap());
        let b = memory_pool(InMemoryOptions::new("shared").unwrap());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_identity_returns_different_pools() {
        let a = memory_pool(InMemoryOptions::new("ns-a").unwrap());
        let b = memory_pool(InMemoryOptions::new("ns-b").unwrap());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn release_sql_pool_is_a_no_op_while_another_handle_is_live() {
        let path = std::env::temp_dir().join("sessionflow-pool-registry-release-test.db");
        let _ = std::fs::remove_file(&path);
        let options = SqlOptions::new(path).unwrap();

        let pool = sql_pool(options.clone());
        let handle = pool.clone_handle();
        assert_eq!(pool.referent_count(), 2);

        release_sql_pool(&options);
        assert_eq!(pool.referent_count(), 2, "a live handle should block teardown");

        drop(handle);
        release_sql_pool(&options);
        assert_eq!(pool.referent_count(), 1);

        let pool2 = sql_pool(options);
        assert!(!Arc::ptr_eq(&pool, &pool2), "removed pools are recreated on next lookup");
    }
}
