//! Common error taxonomy shared by the cache, rate-limiter, and session layers.
//!
//! [`SessionError`] gives every layer the same shape of error so the
//! orchestrator can map transport failures, timeouts, and rate-limit denials
//! into one type without per-layer `From` boilerplate.

use std::fmt;
use std::time::Duration;

/// A common error type that wraps failures from any layer in the request
/// pipeline (rate limiter, cache backend, transport).
///
/// # Type Parameters
///
/// - `E`: the underlying transport error type.
#[derive(Debug, Clone)]
pub enum SessionError<E> {
    /// The transport deadline was exceeded.
    Timeout {
        /// The stage that timed out (e.g. "connect", "read", "pool").
        stage: &'static str,
    },

    /// The rate limiter denied admission and `raise_errors` is set.
    RateLimited {
        /// How long the caller would have had to wait, if known.
        retry_after: Option<Duration>,
    },

    /// A connection-pool resource could not be acquired in time.
    PoolExhausted {
        /// Name of the pool that was exhausted.
        pool: &'static str,
    },

    /// The underlying transport failed (connection/protocol error).
    Transport(E),

    /// A catch-all for failures that don't fit the other variants, such as a
    /// panic caught while running a user callback. Carries a human-readable
    /// reason since there's no structured detail to offer.
    Unknown {
        /// Description of what went wrong.
        reason: String,
    },
}

impl<E> fmt::Display for SessionError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Timeout { stage } => write!(f, "timeout in {stage}"),
            SessionError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {d:?}"),
                None => write!(f, "rate limited"),
            },
            SessionError::PoolExhausted { pool } => write!(f, "pool '{pool}' exhausted"),
            SessionError::Transport(e) => write!(f, "transport error: {e}"),
            SessionError::Unknown { reason } => write!(f, "unknown error: {reason}"),
        }
    }
}

impl<E> std::error::Error for SessionError<E> where E: std::error::Error {}

impl<E> SessionError<E> {
    /// Returns `true` if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }

    /// Returns `true` if this is a rate-limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SessionError::RateLimited { .. })
    }

    /// Returns `true` if this is a transport error.
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }

    /// Builds an [`SessionError::Unknown`] from any displayable cause.
    pub fn unknown(reason: impl fmt::Display) -> Self {
        SessionError::Unknown {
            reason: reason.to_string(),
        }
    }

    /// Extracts the transport error, if this is a `Transport` variant.
    pub fn into_transport(self) -> Option<E> {
        match self {
            SessionError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the transport error using a function.
    pub fn map_transport<F, T>(self, f: F) -> SessionError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            SessionError::Timeout { stage } => SessionError::Timeout { stage },
            SessionError::RateLimited { retry_after } => SessionError::RateLimited { retry_after },
            SessionError::PoolExhausted { pool } => SessionError::PoolExhausted { pool },
            SessionError::Transport(e) => SessionError::Transport(f(e)),
            SessionError::Unknown { reason } => SessionError::Unknown { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct TestError;

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error")
        }
    }

    impl std::error::Error for TestError {}

    const _: () = {
        const fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<SessionError<TestError>>();
    };

    #[test]
    fn timeout_displays_stage() {
        let err: SessionError<TestError> = SessionError::Timeout { stage: "connect" };
        assert_eq!(err.to_string(), "timeout in connect");
        assert!(err.is_timeout());
    }

    #[test]
    fn transport_wraps_inner_display() {
        let err = SessionError::Transport(TestError);
        assert!(err.to_string().contains("test error"));
        assert!(err.is_transport());
    }

    #[test]
    fn map_transport_preserves_non_transport_variants() {
        let err: SessionError<TestError> = SessionError::RateLimited {
            retry_after: Some(Duration::from_secs(1)),
        };
        let mapped = err.map_transport(|_| 42usize);
        assert!(mapped.is_rate_limited());
    }

    #[test]
    fn unknown_carries_reason() {
        let err: SessionError<TestError> = SessionError::unknown("callback panicked");
        assert_eq!(err.to_string(), "unknown error: callback panicked");
    }
}
