//! `sessionflow` is an HTTP client core built around two cross-cutting
//! concerns layered over a pluggable transport: response caching and rate
//! limiting, each available over three storage substrates (in-process
//! memory, an embedded SQL engine, or a remote key/value server), consumed
//! through a single session object in either a native async or a
//! synchronous call style.
//!
//! # Quick start
//!
//! ```toml
//! [dependencies]
//! sessionflow = "0.1"
//! ```
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use sessionflow::session::{AsyncSession, SessionConfigBuilder};
//! use url::Url;
//!
//! let config = SessionConfigBuilder::new()
//!     .cache(true)
//!     .ratelimit(true)
//!     .sliding_window(std::time::Duration::from_secs(1), 50)
//!     .build()?;
//! let session = AsyncSession::new(config).await?;
//! let response = session.get(Url::parse("https://example.com")?).await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```
//!
//! # Layout
//!
//! - [`core`] — the event system, unified error taxonomy, and
//!   blocking/cooperative wait abstraction shared by every other module.
//! - [`response`] — the uniform request/response record.
//! - [`pool`] — backend options and the process-wide connection-pool
//!   registry.
//! - [`cache`] — response caching: `contains`/`get`/`set`/`delete`/`keys`.
//! - [`ratelimit`] — admission control across five algorithms (sliding
//!   window, fixed window, token bucket, leaky bucket, GCRA).
//! - [`session`] — the orchestrator: [`session::AsyncSession`] and
//!   [`session::Session`], composing the above around a [`session::Transport`].
//!
//! # Feature flags
//!
//! - `sqlite` (default) — the embedded SQL backend for caching and rate
//!   limiting.
//! - `redis-backend` (default) — the remote key/value backend.
//! - `tracing` — structured logging of cache/rate-limit/callback events.
//! - `metrics` — Prometheus-style counters for the same events.

pub use sessionflow_cache as cache;
pub use sessionflow_core as core;
pub use sessionflow_pool as pool;
pub use sessionflow_ratelimit as ratelimit;
pub use sessionflow_response as response;
pub use sessionflow_session as session;
