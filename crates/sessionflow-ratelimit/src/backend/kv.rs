//! Remote key/value rate-limiter backend: one Lua script per algorithm, run
//! server-side via `EVAL` so the whole read-modify-write is atomic without a
//! client-side round trip race (§4.5.1).

use std::sync::Arc;
use std::time::Duration;

use redis::Script;
use sessionflow_pool::backend::kv::KvPool;

use crate::algorithm::{Admission, Algorithm, AlgorithmParams};
use crate::error::RateLimitError;

const SLIDING_WINDOW: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count < limit then
    local seq = redis.call('INCR', key .. ':seq')
    redis.call('ZADD', key, now, now .. ':' .. seq)
    redis.call('EXPIRE', key, math.ceil(window) + 1)
    redis.call('EXPIRE', key .. ':seq', math.ceil(window) + 1)
    return 1
end
return 0
"#;

const FIXED_WINDOW: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local data = redis.call('HMGET', key, 'start', 'count')
local start = tonumber(data[1])
local count = tonumber(data[2])
if start == nil or (now - start) >= window then
    start = now
    count = 0
end
local admitted = 0
if count < limit then
    count = count + 1
    admitted = 1
end
redis.call('HMSET', key, 'start', start, 'count', count)
redis.call('EXPIRE', key, math.ceil(window) + 1)
return admitted
"#;

const TOKEN_BUCKET: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local data = redis.call('HMGET', key, 'tokens', 'last')
local tokens = tonumber(data[1])
local last = tonumber(data[2])
if tokens == nil then
    tokens = capacity
    last = now
end
local elapsed = math.max(0, now - last)
tokens = math.min(capacity, tokens + elapsed * rate)
local admitted = 0
if tokens >= 1 then
    tokens = tokens - 1
    admitted = 1
end
redis.call('HMSET', key, 'tokens', tokens, 'last', now)
redis.call('EXPIRE', key, 3600)
return admitted
"#;

const LEAKY_BUCKET: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local data = redis.call('HMGET', key, 'water', 'last')
local water = tonumber(data[1])
local last = tonumber(data[2])
if water == nil then
    water = 0
    last = now
end
local elapsed = math.max(0, now - last)
water = math.max(0, water - elapsed * rate)
local admitted = 0
if water < capacity then
    water = water + 1
    admitted = 1
end
redis.call('HMSET', key, 'water', water, 'last', now)
redis.call('EXPIRE', key, 3600)
return admitted
"#;

const GCRA: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local period = tonumber(ARGV[2])
local burst_limit = tonumber(ARGV[3])
local data = redis.call('HMGET', key, 'tat', 'last')
local tat = tonumber(data[1])
local last = tonumber(data[2])
if tat == nil then
    tat = 0
    last = now
end
local inv = 0
if period > 0 then inv = 1 / period end
tat = math.max(0, tat - (now - last) * inv)
local admitted = 0
if tat < burst_limit then
    tat = tat + period
    admitted = 1
end
redis.call('HMSET', key, 'tat', tat, 'last', now)
redis.call('EXPIRE', key, 3600)
return admitted
"#;

const SLIDING_WINDOW_COUNTER: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local bucket = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local data = redis.call('HMGET', key, 'previous', 'current', 'bucket_start')
local previous = tonumber(data[1]) or 0
local current = tonumber(data[2]) or 0
local bucket_start = tonumber(data[3])
if bucket_start == nil then
    bucket_start = now
end
local elapsed = now - bucket_start
if elapsed >= bucket then
    local buckets_passed = math.floor(elapsed / bucket)
    if buckets_passed >= 2 then
        previous = 0
        current = 0
    else
        previous = current
        current = 0
    end
    bucket_start = now
    elapsed = now - bucket_start
end
local ratio = elapsed / bucket
if ratio > 1 then ratio = 1 end
if ratio < 0 then ratio = 0 end
local weighted = previous * (1 - ratio) + current
local admitted = 0
if weighted < limit then
    current = current + 1
    admitted = 1
end
redis.call('HMSET', key, 'previous', previous, 'current', current, 'bucket_start', bucket_start)
redis.call('EXPIRE', key, math.ceil(bucket) + 1)
return admitted
"#;

/// Picks the Lua script and its two algorithm-specific numeric arguments for
/// `algorithm`. Pulled out as a pure function so the selection logic is
/// testable without a live server.
fn script_for(algorithm: Algorithm, params: &AlgorithmParams) -> (&'static str, f64, f64) {
    match algorithm {
        Algorithm::SlidingWindow => (SLIDING_WINDOW, params.window.as_secs_f64(), params.limit as f64),
        Algorithm::FixedWindow => (FIXED_WINDOW, params.window.as_secs_f64(), params.limit as f64),
        Algorithm::TokenBucket => (TOKEN_BUCKET, params.capacity, params.rate),
        Algorithm::LeakyBucket => (LEAKY_BUCKET, params.capacity, params.rate),
        Algorithm::Gcra => (GCRA, params.period.as_secs_f64(), params.burst_limit),
        Algorithm::SlidingWindowCounter => {
            (SLIDING_WINDOW_COUNTER, params.window.as_secs_f64(), params.limit as f64)
        }
    }
}

pub struct KvBackend {
    pool: Arc<KvPool>,
    handle: Arc<()>,
}

impl KvBackend {
    pub fn new(pool: Arc<KvPool>) -> Self {
        let handle = pool.clone_handle();
        KvBackend { pool, handle }
    }

    pub async fn try_admit(
        &self,
        key: &str,
        algorithm: Algorithm,
        params: &AlgorithmParams,
        now: f64,
    ) -> Result<Admission, RateLimitError> {
        let mut conn = self.pool.acquire();
        let (source, arg2, arg3) = script_for(algorithm, params);

        let admitted: i64 = Script::new(source)
            .key(key)
            .arg(now)
            .arg(arg2)
            .arg(arg3)
            .invoke_async(&mut conn)
            .await
            .map_err(sessionflow_pool::PoolError::Redis)?;

        Ok(Admission {
            admitted: admitted == 1,
            // The KV script only returns the admit/deny bit; the increment
            // loop polls on its own `sleep_duration` rather than relying on
            // a precise retry hint, so this is advisory only.
            retry_after: Duration::ZERO,
        })
    }
}

impl Drop for KvBackend {
    fn drop(&mut self) {
        drop(std::mem::replace(&mut self.handle, Arc::new(())));
        sessionflow_pool::registry::release_kv_pool(self.pool.options());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_algorithm_selects_a_nonempty_script() {
        let window_params = AlgorithmParams::window(Duration::from_secs(1), 10);
        let bucket_params = AlgorithmParams::bucket(5.0, 2.0);
        let gcra_params = AlgorithmParams::gcra(Duration::from_secs(1), 2.0);

        for (algo, params) in [
            (Algorithm::SlidingWindow, window_params),
            (Algorithm::FixedWindow, window_params),
            (Algorithm::SlidingWindowCounter, window_params),
            (Algorithm::TokenBucket, bucket_params),
            (Algorithm::LeakyBucket, bucket_params),
            (Algorithm::Gcra, gcra_params),
        ] {
            let (script, _, _) = script_for(algo, &params);
            assert!(!script.trim().is_empty());
        }
    }

    #[test]
    fn window_algorithms_pass_window_and_limit() {
        let params = AlgorithmParams::window(Duration::from_secs(2), 7);
        let (_, window, limit) = script_for(Algorithm::SlidingWindow, &params);
        assert_eq!(window, 2.0);
        assert_eq!(limit, 7.0);
    }
}
