//! Rate-limiter observability events.

use std::time::{Duration, Instant};

use sessionflow_core::SessionEvent;

/// An observable event from a [`crate::RateLimiter`].
#[derive(Debug, Clone)]
pub enum RateLimitEvent {
    Admitted {
        key: String,
        wait_duration: Duration,
        timestamp: Instant,
    },
    Denied {
        key: String,
        timestamp: Instant,
    },
}

impl SessionEvent for RateLimitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimitEvent::Admitted { .. } => "admitted",
            RateLimitEvent::Denied { .. } => "denied",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimitEvent::Admitted { timestamp, .. } | RateLimitEvent::Denied { timestamp, .. } => {
                *timestamp
            }
        }
    }

    fn pattern_name(&self) -> &str {
        "ratelimit"
    }
}
