//! Errors raised by the rate-limiter layer.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while constructing or operating a
/// [`crate::RateLimiter`].
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("unknown rate-limit algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error(transparent)]
    Options(#[from] sessionflow_pool::OptionsError),

    #[error(transparent)]
    Pool(#[from] sessionflow_pool::PoolError),

    /// No permit could be acquired within the configured wait bound. Carries
    /// the backend's own computed retry delay so callers don't have to
    /// re-derive it.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    Exceeded { retry_after: Duration },

    #[error("{0}")]
    Other(String),
}

impl<E> From<RateLimitError> for sessionflow_core::SessionError<E> {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded { retry_after } => sessionflow_core::SessionError::RateLimited {
                retry_after: Some(retry_after),
            },
            other => sessionflow_core::SessionError::unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceeded_displays_retry_after() {
        let err = RateLimitError::Exceeded {
            retry_after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 2s");
    }
}
