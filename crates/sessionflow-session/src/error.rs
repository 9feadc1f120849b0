//! The unified session error surface (§7). Every fallible session operation
//! returns [`SessionError<TransportError>`](sessionflow_core::SessionError);
//! cache and rate-limit failures fold in through the `From` impls those
//! crates already provide, so the orchestrator never matches on a
//! per-layer error type.

use thiserror::Error;

use crate::transport::TransportError;

/// Shorthand for the error type every session operation returns.
pub type SessionError = sessionflow_core::SessionError<TransportError>;

/// Shorthand for the result type every session operation returns.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised while building a [`crate::SessionConfig`].
#[derive(Debug, Error)]
pub enum SessionConfigError {
    #[error(transparent)]
    Cache(#[from] sessionflow_cache::CacheError),

    #[error(transparent)]
    RateLimit(#[from] sessionflow_ratelimit::RateLimitError),

    #[error(transparent)]
    Options(#[from] sessionflow_pool::OptionsError),

    /// `backend` named a non-memory backend but no explicit options for it
    /// were supplied — there's no sensible default path/host to fall back
    /// to, unlike the in-memory backend.
    #[error("{subsystem} selected the {backend} backend but no {backend} options were supplied")]
    BackendOptionsRequired {
        subsystem: &'static str,
        backend: &'static str,
    },

    /// The default transport (a `reqwest::Client`) failed to build, e.g. a
    /// malformed TLS configuration.
    #[error("failed to construct the default transport: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_options_required_displays_subsystem_and_backend() {
        let err = SessionConfigError::BackendOptionsRequired {
            subsystem: "cache",
            backend: "sqlite",
        };
        assert_eq!(
            err.to_string(),
            "cache selected the sqlite backend but no sqlite options were supplied"
        );
    }
}
