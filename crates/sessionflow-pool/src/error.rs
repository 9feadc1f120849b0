//! Errors raised while validating backend options or operating a pool.

use thiserror::Error;

/// Raised while constructing a backend [`crate::options`] value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("{field} must be one of {allowed:?}, got {got:?}")]
    InvalidEnumValue {
        field: &'static str,
        allowed: &'static [&'static str],
        got: String,
    },

    #[error("port {0} is out of range")]
    InvalidPort(u32),

    #[error("{0}")]
    InconsistentOptions(&'static str),
}

/// Raised while acquiring, releasing, or operating on a pooled resource.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{pool}' exhausted waiting for a connection")]
    Exhausted { pool: &'static str },

    #[error("pool is closed")]
    Closed,

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "redis-backend")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("{0}")]
    Other(String),
}
