//! The three concrete cache backends, one per [`sessionflow_pool::BackendKind`].

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sql;
#[cfg(feature = "redis-backend")]
pub mod kv;
