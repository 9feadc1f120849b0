//! The callback runner (C7): callbacks must never be able to crash the
//! request pipeline, so every invocation is isolated the same way
//! `sessionflow_core::EventListeners::emit` isolates event listeners — with
//! `std::panic::catch_unwind` around each call.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use sessionflow_response::{CallbackOutcome, Response};

/// A user callback invoked once per completed request with the final
/// response. Its return value is stringified and recorded; a panic is
/// caught and recorded instead of propagating.
pub type Callback = Box<dyn Fn(&Response) -> String + Send + Sync>;

/// Invoked once per completed request (including cache hits), regardless of
/// whether any callbacks ran.
pub type ProgressTick = Arc<dyn Fn() + Send + Sync>;

/// Runs `callbacks` over `response` in order, isolating panics, then
/// advances `progress_tick` exactly once.
///
/// If `callbacks` is empty, or `response.error` is set and `run_on_error` is
/// `false`, no callback runs but the tick still fires — ticks count
/// completed requests, not callback invocations.
pub fn run_callbacks(
    response: &mut Response,
    is_cached: bool,
    callbacks: &[Callback],
    run_on_error: bool,
    progress_tick: Option<&ProgressTick>,
) {
    response.set_is_cached(is_cached);

    let skip = callbacks.is_empty() || (response.error.is_some() && !run_on_error);
    if !skip {
        let mut results = Vec::with_capacity(callbacks.len());
        for callback in callbacks {
            let outcome = match catch_unwind(AssertUnwindSafe(|| callback(response))) {
                Ok(value) => CallbackOutcome::Ok(value),
                Err(panic) => CallbackOutcome::Err(panic_message(panic)),
            };
            #[cfg(feature = "tracing")]
            if let CallbackOutcome::Err(ref reason) = outcome {
                tracing::warn!(panic_message = %reason, "session callback panicked");
            }
            results.push(outcome);
        }
        response.set_callback_results(results);
    }

    if let Some(tick) = progress_tick {
        tick();
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use sessionflow_response::ResponseBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    fn sample() -> Response {
        ResponseBuilder::new(
            StatusCode::OK,
            Method::GET,
            Url::parse("https://example.com/x").unwrap(),
        )
        .build()
    }

    fn sample_error() -> Response {
        ResponseBuilder::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            Method::GET,
            Url::parse("https://example.com/x").unwrap(),
        )
        .error("boom")
        .build()
    }

    #[test]
    fn callbacks_run_in_order_and_record_results() {
        let mut response = sample();
        let callbacks: Vec<Callback> = vec![
            Box::new(|_r| "first".to_string()),
            Box::new(|_r| "second".to_string()),
        ];
        run_callbacks(&mut response, false, &callbacks, false, None);
        assert_eq!(
            response.callback_results,
            vec![
                CallbackOutcome::Ok("first".to_string()),
                CallbackOutcome::Ok("second".to_string())
            ]
        );
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let mut response = sample();
        let callbacks: Vec<Callback> = vec![
            Box::new(|_r| panic!("kaboom")),
            Box::new(|_r| "survived".to_string()),
        ];
        run_callbacks(&mut response, false, &callbacks, false, None);
        assert_eq!(response.callback_results.len(), 2);
        assert!(matches!(response.callback_results[0], CallbackOutcome::Err(_)));
        assert_eq!(
            response.callback_results[1],
            CallbackOutcome::Ok("survived".to_string())
        );
    }

    #[test]
    fn callbacks_skipped_on_error_unless_run_on_error_is_set() {
        let mut response = sample_error();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let callbacks: Vec<Callback> = vec![Box::new(move |_resp| {
            r.fetch_add(1, Ordering::SeqCst);
            "ran".to_string()
        })];

        run_callbacks(&mut response, false, &callbacks, false, None);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(response.callback_results.is_empty());

        run_callbacks(&mut response, false, &callbacks, true, None);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn progress_tick_fires_even_without_callbacks() {
        let mut response = sample();
        let ticks = Arc::new(AtomicUsize::new(0));
        let t = ticks.clone();
        let tick: ProgressTick = Arc::new(move || {
            t.fetch_add(1, Ordering::SeqCst);
        });
        run_callbacks(&mut response, false, &[], false, Some(&tick));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn is_cached_flag_is_applied() {
        let mut response = sample();
        run_callbacks(&mut response, true, &[], false, None);
        assert!(response.is_cached);
    }
}
