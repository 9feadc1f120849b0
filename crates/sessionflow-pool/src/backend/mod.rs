#[cfg(feature = "sqlite")]
pub mod sql;

#[cfg(feature = "redis-backend")]
pub mod kv;

pub mod memory;
