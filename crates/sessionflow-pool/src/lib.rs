//! Backend options (C2) and the process-wide connection-pool registry (C3)
//! shared by the cache and rate-limiter layers.
//!
//! Three backend kinds — [`options::InMemoryOptions`],
//! [`options::SqlOptions`], [`options::KvOptions`] — each with a stable
//! identity so [`registry`] can hand back the same pool for the same
//! options instead of creating a new one per session.

pub mod backend;
pub mod error;
pub mod options;
pub mod registry;

pub use error::{OptionsError, PoolError};
pub use options::{BackendKind, InMemoryOptions, MaxMemoryPolicy};

#[cfg(feature = "sqlite")]
pub use options::SqlOptions;

#[cfg(feature = "redis-backend")]
pub use options::KvOptions;
