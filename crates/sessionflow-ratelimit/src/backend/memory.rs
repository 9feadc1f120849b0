//! In-memory rate-limiter backend: per-key algorithm state stored in the
//! shared pool, mutated atomically under the pool's single write lock
//! (`InMemoryPool::update`) so a concurrent `ok`+admit pair on the same key
//! never races (§4.5.1, §5).

use std::sync::Arc;
use std::time::Duration;

use sessionflow_pool::backend::memory::InMemoryPool;

use crate::algorithm::{AlgoState, Admission, Algorithm, AlgorithmParams};
use crate::error::RateLimitError;

pub struct MemoryBackend {
    pool: Arc<InMemoryPool>,
}

impl MemoryBackend {
    pub fn new(pool: Arc<InMemoryPool>) -> Self {
        MemoryBackend { pool }
    }

    pub async fn try_admit(
        &self,
        key: &str,
        algorithm: Algorithm,
        params: &AlgorithmParams,
        now: f64,
        ttl: Duration,
    ) -> Result<Admission, RateLimitError> {
        let ttl = if ttl.is_zero() { None } else { Some(ttl) };
        let mut admission = Admission {
            admitted: false,
            retry_after: Duration::ZERO,
        };
        self.pool.update(key, ttl, |prev| {
            let mut state = prev
                .and_then(|bytes| serde_json::from_slice::<AlgoState>(&bytes).ok())
                .unwrap_or_else(|| AlgoState::initial(algorithm, params, now));
            admission = state.try_admit(params, now);
            serde_json::to_vec(&state).unwrap_or_default()
        })?;
        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionflow_pool::InMemoryOptions;

    fn pool() -> Arc<InMemoryPool> {
        Arc::new(InMemoryPool::new(InMemoryOptions::new("ns").unwrap()))
    }

    #[tokio::test]
    async fn admits_up_to_limit_then_denies() {
        let backend = MemoryBackend::new(pool());
        let params = AlgorithmParams::window(Duration::from_secs(1), 1);
        assert!(backend
            .try_admit("k:ratelimit", Algorithm::FixedWindow, &params, 0.0, Duration::ZERO)
            .await
            .unwrap()
            .admitted);
        assert!(!backend
            .try_admit("k:ratelimit", Algorithm::FixedWindow, &params, 0.1, Duration::ZERO)
            .await
            .unwrap()
            .admitted);
    }
}
