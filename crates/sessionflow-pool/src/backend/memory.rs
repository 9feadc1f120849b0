//! The in-memory pool: a single shared, mutex-guarded mapping plus a
//! bounded-frequency sweep, grounded in `MemoryPool`'s class-level shared
//! dict + lazy sweep-on-access design.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::error::PoolError;
use crate::options::InMemoryOptions;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Shared in-process key/value store used by both the cache and
/// rate-limiter layers when configured for the `memory` backend.
///
/// One `InMemoryPool` is created per distinct [`InMemoryOptions`] identity;
/// the cache and rate-limiter namespaces coexist in the same map (as in the
/// original source) but never collide because their keys always end in
/// `"cache"` or `"ratelimit"` respectively.
pub struct InMemoryPool {
    options: InMemoryOptions,
    store: RwLock<HashMap<String, Entry>>,
    last_swept: Mutex<Instant>,
}

impl InMemoryPool {
    pub fn new(options: InMemoryOptions) -> Self {
        InMemoryPool {
            options,
            store: RwLock::new(HashMap::new()),
            last_swept: Mutex::new(Instant::now()),
        }
    }

    fn maybe_sweep(&self) {
        let mut last_swept = self.last_swept.lock().unwrap();
        if last_swept.elapsed() < self.options.check_frequency {
            return;
        }
        *last_swept = Instant::now();
        drop(last_swept);

        let now = Instant::now();
        self.store
            .write()
            .unwrap()
            .retain(|_, entry| entry.expires_at.map(|exp| exp > now).unwrap_or(true));
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PoolError> {
        self.maybe_sweep();
        let store = self.store.read().unwrap();
        match store.get(key) {
            Some(entry) if entry.expires_at.map(|e| e > Instant::now()).unwrap_or(true) => {
                Ok(Some(entry.value.clone()))
            }
            _ => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), PoolError> {
        self.maybe_sweep();
        let expires_at = ttl.filter(|d| !d.is_zero()).map(|d| Instant::now() + d);
        self.store
            .write()
            .unwrap()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    pub fn contains(&self, key: &str) -> Result<bool, PoolError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn delete(&self, key: &str) -> Result<(), PoolError> {
        self.store.write().unwrap().remove(key);
        Ok(())
    }

    /// Keys whose namespace suffix matches (e.g. `"cache"` or
    /// `"ratelimit"`), so callers can enumerate their own namespace without
    /// ever seeing the other's entries.
    pub fn keys_with_suffix(&self, suffix: &str) -> Result<Vec<String>, PoolError> {
        self.maybe_sweep();
        let now = Instant::now();
        Ok(self
            .store
            .read()
            .unwrap()
            .iter()
            .filter(|(k, e)| {
                k.ends_with(suffix) && e.expires_at.map(|exp| exp > now).unwrap_or(true)
            })
            .map(|(k, _)| k.clone())
            .collect())
    }

    pub fn clear_namespace(&self, suffix: &str) -> Result<(), PoolError> {
        self.store.write().unwrap().retain(|k, _| !k.ends_with(suffix));
        Ok(())
    }

    /// Loads, mutates, and stores the value at `key` under a single
    /// write-lock acquisition, so read-modify-write callers (the
    /// rate-limiter's per-key algorithm state) never race with a concurrent
    /// `update`/`get`/`set` on the same key.
    pub fn update<F>(&self, key: &str, ttl: Option<Duration>, f: F) -> Result<Vec<u8>, PoolError>
    where
        F: FnOnce(Option<Vec<u8>>) -> Vec<u8>,
    {
        self.maybe_sweep();
        let mut store = self.store.write().unwrap();
        let now = Instant::now();
        let current = store
            .get(key)
            .filter(|e| e.expires_at.map(|exp| exp > now).unwrap_or(true))
            .map(|e| e.value.clone());
        let new_value = f(current);
        let expires_at = ttl.filter(|d| !d.is_zero()).map(|d| Instant::now() + d);
        store.insert(
            key.to_string(),
            Entry {
                value: new_value.clone(),
                expires_at,
            },
        );
        Ok(new_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> InMemoryPool {
        InMemoryPool::new(InMemoryOptions::new("ns").unwrap())
    }

    #[test]
    fn set_then_get_round_trips() {
        let pool = pool();
        pool.set("a:cache", b"v".to_vec(), None).unwrap();
        assert_eq!(pool.get("a:cache").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn expired_entry_is_absent() {
        let pool = pool();
        pool.set("a:cache", b"v".to_vec(), Some(Duration::from_millis(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pool.get("a:cache").unwrap(), None);
    }

    #[test]
    fn clear_namespace_only_affects_matching_suffix() {
        let pool = pool();
        pool.set("a:cache", b"v".to_vec(), None).unwrap();
        pool.set("a:ratelimit", b"v".to_vec(), None).unwrap();

        pool.clear_namespace("cache").unwrap();

        assert_eq!(pool.get("a:cache").unwrap(), None);
        assert_eq!(pool.get("a:ratelimit").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn update_sees_prior_value_and_persists_new_one() {
        let pool = pool();
        pool.update("a:ratelimit", None, |prev| {
            assert_eq!(prev, None);
            b"1".to_vec()
        })
        .unwrap();
        pool.update("a:ratelimit", None, |prev| {
            assert_eq!(prev, Some(b"1".to_vec()));
            b"2".to_vec()
        })
        .unwrap();
        assert_eq!(pool.get("a:ratelimit").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn keys_with_suffix_filters_namespace() {
        let pool = pool();
        pool.set("a:cache", b"v".to_vec(), None).unwrap();
        pool.set("b:ratelimit", b"v".to_vec(), None).unwrap();

        let cache_keys = pool.keys_with_suffix("cache").unwrap();
        assert_eq!(cache_keys, vec!["a:cache".to_string()]);
    }
}
