//! Core infrastructure shared by the cache, rate-limiter, pool, and session
//! crates in this workspace:
//!
//! - Event system for observability ([`events`])
//! - A unified error type ([`error`])
//! - The blocking/cooperative wait abstraction that lets the rate limiter's
//!   algorithms be written once and reused by both call styles ([`waiter`])
//! - The namespace key-joining helper shared by the cache and rate-limiter
//!   key derivations ([`keys`])

pub mod error;
pub mod events;
pub mod keys;
pub mod waiter;

pub use error::SessionError;
pub use events::{EventListener, EventListeners, FnListener, SessionEvent};
pub use waiter::{BlockingWaiter, CooperativeWaiter, Waiter};
