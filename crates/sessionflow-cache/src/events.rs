//! Cache observability events, emitted through the shared
//! [`sessionflow_core::events`] plumbing.

use std::time::Instant;

use sessionflow_core::SessionEvent;

/// An observable event from a [`crate::Cache`].
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit { key: String, timestamp: Instant },
    Miss { key: String, timestamp: Instant },
    Stored { key: String, timestamp: Instant },
    Evicted { key: String, timestamp: Instant },
    Cleared { timestamp: Instant },
}

impl SessionEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Stored { .. } => "stored",
            CacheEvent::Evicted { .. } => "evicted",
            CacheEvent::Cleared { .. } => "cleared",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Stored { timestamp, .. }
            | CacheEvent::Evicted { timestamp, .. }
            | CacheEvent::Cleared { timestamp } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        "cache"
    }
}
