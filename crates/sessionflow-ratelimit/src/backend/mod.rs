//! The three concrete rate-limiter backends, one per
//! [`sessionflow_pool::BackendKind`].

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sql;
#[cfg(feature = "redis-backend")]
pub mod kv;
