//! Blocking vs. cooperative wait abstraction.
//!
//! The rate-limiter algorithms are written once and parameterized over a
//! [`Waiter`]: the sync session blocks the OS thread, the async session
//! suspends the task. Nothing else about the admission loop differs between
//! the two call styles.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Suspends the current call for `duration`, either by blocking the thread
/// or by cooperatively yielding to an executor.
pub trait Waiter: Send + Sync {
    /// Suspends for `duration`. Returns a future so the same trait object
    /// serves both the blocking and cooperative implementations; the
    /// blocking implementation's future resolves synchronously inside
    /// `poll` via `std::thread::sleep`.
    fn wait<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Waits by blocking the current OS thread with [`std::thread::sleep`].
///
/// Used by the synchronous session and the synchronous backends of the
/// cache/rate-limiter layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingWaiter;

impl Waiter for BlockingWaiter {
    fn wait<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !duration.is_zero() {
                std::thread::sleep(duration);
            }
        })
    }
}

/// Waits by cooperatively suspending the task via [`tokio::time::sleep`].
///
/// Used by the asynchronous session so concurrent fan-out requests make
/// progress on other tasks while one is waiting for admission.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooperativeWaiter;

impl Waiter for CooperativeWaiter {
    fn wait<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }
        })
    }
}
