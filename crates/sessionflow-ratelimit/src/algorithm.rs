//! The five contractual rate-limiting algorithms (§4.5.1), expressed as pure
//! state machines over epoch-second timestamps so the same logic drives the
//! in-memory, SQL, and remote-KV backends — only how the state is loaded and
//! persisted differs between them.

use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which algorithm a [`crate::RateLimiter`] enforces.
///
/// `SlidingWindowCounter` is the cheaper, approximate sixth variant carried
/// forward from the prior implementation of this crate (§4.5.1); it is not
/// one of the five canonical names and is only reachable by explicitly
/// constructing [`Algorithm::SlidingWindowCounter`], never by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    SlidingWindow,
    FixedWindow,
    TokenBucket,
    LeakyBucket,
    Gcra,
    SlidingWindowCounter,
}

impl FromStr for Algorithm {
    type Err = crate::error::RateLimitError;

    /// Accepts any documented spelling of the five canonical names —
    /// hyphenated, underscored, run together, or mixed-case
    /// (`"sliding-window"`, `"sliding_window"`, `"slidingwindow"`,
    /// `"SlidingWindow"` all resolve alike) — by stripping separators and
    /// lowercasing before matching.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(|c| c.to_lowercase())
            .collect();
        match normalized.as_str() {
            "slidingwindow" => Ok(Algorithm::SlidingWindow),
            "fixedwindow" => Ok(Algorithm::FixedWindow),
            "tokenbucket" => Ok(Algorithm::TokenBucket),
            "leakybucket" => Ok(Algorithm::LeakyBucket),
            "gcra" => Ok(Algorithm::Gcra),
            _ => Err(crate::error::RateLimitError::UnknownAlgorithm(
                s.to_string(),
            )),
        }
    }
}

/// Parameters for whichever [`Algorithm`] is selected. Not every field is
/// meaningful for every algorithm; [`AlgorithmParams::window`] constructors
/// below pick the right ones.
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmParams {
    pub window: Duration,
    pub limit: usize,
    pub capacity: f64,
    pub rate: f64,
    pub period: Duration,
    pub burst_limit: f64,
}

impl AlgorithmParams {
    pub fn window(window: Duration, limit: usize) -> Self {
        AlgorithmParams {
            window,
            limit,
            capacity: limit as f64,
            rate: 0.0,
            period: Duration::ZERO,
            burst_limit: 0.0,
        }
    }

    pub fn bucket(capacity: f64, rate: f64) -> Self {
        AlgorithmParams {
            window: Duration::ZERO,
            limit: 0,
            capacity,
            rate,
            period: Duration::ZERO,
            burst_limit: 0.0,
        }
    }

    pub fn gcra(period: Duration, burst_limit: f64) -> Self {
        AlgorithmParams {
            window: Duration::ZERO,
            limit: 0,
            capacity: 0.0,
            rate: 0.0,
            period,
            burst_limit,
        }
    }
}

/// The outcome of one admission attempt: whether it was admitted, and, if
/// not, how long the caller should wait before retrying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub admitted: bool,
    pub retry_after: Duration,
}

/// Per-key state for whichever algorithm is configured. One of these lives
/// behind a mutex (memory), a row (SQL), or a key (KV) per rate-limited key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlgoState {
    SlidingWindow { timestamps: VecDeque<f64> },
    FixedWindow { window_start: f64, count: usize },
    TokenBucket { tokens: f64, last_refill: f64 },
    LeakyBucket { water: f64, last_check: f64 },
    Gcra { tat: f64, last: f64 },
    SlidingWindowCounter { previous: usize, current: usize, bucket_start: f64 },
}

impl AlgoState {
    pub fn initial(algorithm: Algorithm, params: &AlgorithmParams, now: f64) -> Self {
        match algorithm {
            Algorithm::SlidingWindow => AlgoState::SlidingWindow {
                timestamps: VecDeque::new(),
            },
            Algorithm::FixedWindow => AlgoState::FixedWindow {
                window_start: now,
                count: 0,
            },
            Algorithm::TokenBucket => AlgoState::TokenBucket {
                tokens: params.capacity,
                last_refill: now,
            },
            Algorithm::LeakyBucket => AlgoState::LeakyBucket {
                water: 0.0,
                last_check: now,
            },
            Algorithm::Gcra => AlgoState::Gcra { tat: 0.0, last: now },
            Algorithm::SlidingWindowCounter => AlgoState::SlidingWindowCounter {
                previous: 0,
                current: 0,
                bucket_start: now,
            },
        }
    }

    /// Attempts admission at `now` (epoch seconds); mutates state iff
    /// admitted.
    pub fn try_admit(&mut self, params: &AlgorithmParams, now: f64) -> Admission {
        match self {
            AlgoState::SlidingWindow { timestamps } => {
                let window = params.window.as_secs_f64();
                while let Some(&front) = timestamps.front() {
                    if now - front >= window {
                        timestamps.pop_front();
                    } else {
                        break;
                    }
                }
                if timestamps.len() < params.limit {
                    timestamps.push_back(now);
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let oldest = *timestamps.front().unwrap_or(&now);
                    let retry = (oldest + window - now).max(0.0);
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(retry),
                    }
                }
            }
            AlgoState::FixedWindow { window_start, count } => {
                let window = params.window.as_secs_f64();
                if now - *window_start >= window {
                    *window_start = now;
                    *count = 0;
                }
                if *count < params.limit {
                    *count += 1;
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let retry = (*window_start + window - now).max(0.0);
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(retry),
                    }
                }
            }
            AlgoState::TokenBucket { tokens, last_refill } => {
                let elapsed = (now - *last_refill).max(0.0);
                *tokens = (*tokens + elapsed * params.rate).min(params.capacity);
                *last_refill = now;
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let deficit = 1.0 - *tokens;
                    let retry = if params.rate > 0.0 { deficit / params.rate } else { 0.0 };
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(retry),
                    }
                }
            }
            AlgoState::LeakyBucket { water, last_check } => {
                let elapsed = (now - *last_check).max(0.0);
                *water = (*water - elapsed * params.rate).max(0.0);
                *last_check = now;
                if *water < params.capacity {
                    *water += 1.0;
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let excess = *water - params.capacity + 1.0;
                    let retry = if params.rate > 0.0 { excess / params.rate } else { 0.0 };
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(retry),
                    }
                }
            }
            AlgoState::Gcra { tat, last } => {
                // Literal translation of the spec formula: tat decays by
                // elapsed/period and grows by `period` on each admission.
                let period = params.period.as_secs_f64();
                let inv = if period > 0.0 { 1.0 / period } else { 0.0 };
                *tat = (*tat - (now - *last) * inv).max(0.0);
                *last = now;
                if *tat < params.burst_limit {
                    *tat += period;
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let excess = *tat - params.burst_limit;
                    let retry = if inv > 0.0 { excess * period } else { 0.0 };
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(retry),
                    }
                }
            }
            AlgoState::SlidingWindowCounter {
                previous,
                current,
                bucket_start,
            } => {
                let bucket = params.window.as_secs_f64();
                let mut elapsed = now - *bucket_start;
                if elapsed >= bucket {
                    let buckets_passed = (elapsed / bucket) as u32;
                    if buckets_passed >= 2 {
                        *previous = 0;
                        *current = 0;
                    } else {
                        *previous = *current;
                        *current = 0;
                    }
                    *bucket_start = now;
                    elapsed = now - *bucket_start;
                }
                let ratio = (elapsed / bucket).clamp(0.0, 1.0);
                let weighted = (*previous as f64) * (1.0 - ratio) + (*current as f64);
                if weighted < params.limit as f64 {
                    *current += 1;
                    Admission {
                        admitted: true,
                        retry_after: Duration::ZERO,
                    }
                } else {
                    let remaining = bucket * (1.0 - ratio);
                    Admission {
                        admitted: false,
                        retry_after: Duration::from_secs_f64(remaining),
                    }
                }
            }
        }
    }
}
