//! Embedded SQL rate-limiter backend: one row per key in
//! `ratelimit(key TEXT PRIMARY KEY, state TEXT, expiration REAL)`, the whole
//! read-modify-write wrapped in a `BEGIN IMMEDIATE`/`COMMIT` transaction so
//! it is atomic with respect to any other thread's transaction on the same
//! row (§4.5.1, §5).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension};
use sessionflow_pool::backend::sql::SqlPool;

use crate::algorithm::{AlgoState, Admission, Algorithm, AlgorithmParams};
use crate::error::RateLimitError;

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub struct SqlBackend {
    pool: Arc<SqlPool>,
    handle: Arc<()>,
}

impl SqlBackend {
    pub fn new(pool: Arc<SqlPool>) -> Result<Self, RateLimitError> {
        let conn = pool.acquire(Duration::from_secs(5))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ratelimit (
                key TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                expiration REAL
            )",
            [],
        )
        .map_err(sessionflow_pool::PoolError::Sqlite)?;
        drop(conn);
        let handle = pool.clone_handle();
        Ok(SqlBackend { pool, handle })
    }

    pub async fn try_admit(
        &self,
        key: &str,
        algorithm: Algorithm,
        params: AlgorithmParams,
        now: f64,
        ttl: Duration,
    ) -> Result<Admission, RateLimitError> {
        let pool = self.pool.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Admission, RateLimitError> {
            let conn = pool.acquire(Duration::from_secs(5))?;
            conn.execute("BEGIN IMMEDIATE", [])
                .map_err(sessionflow_pool::PoolError::Sqlite)?;

            let outcome = (|| -> Result<Admission, RateLimitError> {
                conn.execute(
                    "DELETE FROM ratelimit WHERE expiration IS NOT NULL AND expiration < ?1",
                    params![now_epoch_secs()],
                )
                .map_err(sessionflow_pool::PoolError::Sqlite)?;

                let stored: Option<String> = conn
                    .query_row(
                        "SELECT state FROM ratelimit WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(sessionflow_pool::PoolError::Sqlite)?;

                let mut state = stored
                    .as_deref()
                    .and_then(|json| serde_json::from_str::<AlgoState>(json).ok())
                    .unwrap_or_else(|| AlgoState::initial(algorithm, &params, now));

                let admission = state.try_admit(&params, now);

                let json = serde_json::to_string(&state)
                    .map_err(|e| RateLimitError::Other(e.to_string()))?;
                let expiration = if ttl.is_zero() {
                    None
                } else {
                    Some(now + ttl.as_secs_f64())
                };
                conn.execute(
                    "INSERT OR REPLACE INTO ratelimit (key, state, expiration) VALUES (?1, ?2, ?3)",
                    params![key, json, expiration],
                )
                .map_err(sessionflow_pool::PoolError::Sqlite)?;

                Ok(admission)
            })();

            if outcome.is_ok() {
                conn.execute("COMMIT", [])
                    .map_err(sessionflow_pool::PoolError::Sqlite)?;
            } else {
                let _ = conn.execute("ROLLBACK", []);
            }

            outcome
        })
        .await
        .map_err(|e| RateLimitError::Other(e.to_string()))?
    }
}

impl Drop for SqlBackend {
    fn drop(&mut self) {
        drop(std::mem::replace(&mut self.handle, Arc::new(())));
        sessionflow_pool::registry::release_sql_pool(self.pool.options());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionflow_pool::backend::sql::SqlPool;
    use sessionflow_pool::options::SqlOptions;
    use std::sync::atomic::{AtomicU32, Ordering};

    // `spawn_blocking` may hand consecutive calls to different OS threads,
    // and the SQL pool is thread-affine, so an in-memory `:memory:` database
    // (private to one connection) would silently lose state between calls.
    // A file-backed database is visible to every thread that opens it.
    fn backend() -> SqlBackend {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("sessionflow-ratelimit-test-{n}.db"));
        let _ = std::fs::remove_file(&path);
        let pool = Arc::new(SqlPool::new(SqlOptions::new(path).unwrap()));
        SqlBackend::new(pool).unwrap()
    }

    #[tokio::test]
    async fn admits_up_to_limit_then_denies() {
        let backend = backend();
        let params = AlgorithmParams::window(Duration::from_secs(1), 1);
        let first = backend
            .try_admit("k:ratelimit", Algorithm::FixedWindow, params, 0.0, Duration::ZERO)
            .await
            .unwrap();
        assert!(first.admitted);
        let second = backend
            .try_admit("k:ratelimit", Algorithm::FixedWindow, params, 0.1, Duration::ZERO)
            .await
            .unwrap();
        assert!(!second.admitted);
    }

    #[tokio::test]
    async fn state_persists_across_calls() {
        let backend = backend();
        let params = AlgorithmParams::bucket(2.0, 1.0);
        assert!(backend
            .try_admit("k:ratelimit", Algorithm::TokenBucket, params, 0.0, Duration::ZERO)
            .await
            .unwrap()
            .admitted);
        assert!(backend
            .try_admit("k:ratelimit", Algorithm::TokenBucket, params, 0.0, Duration::ZERO)
            .await
            .unwrap()
            .admitted);
        assert!(!backend
            .try_admit("k:ratelimit", Algorithm::TokenBucket, params, 0.0, Duration::ZERO)
            .await
            .unwrap()
            .admitted);
    }
}
