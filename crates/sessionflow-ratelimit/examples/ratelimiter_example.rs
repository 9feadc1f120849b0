//! Rate limiter demo comparing window types and boundary behavior.
//!
//! Run with: cargo run --example ratelimiter_example -p sessionflow-ratelimit

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sessionflow_core::waiter::CooperativeWaiter;
use sessionflow_ratelimit::{RateLimitConfigBuilder, RateLimiter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== sessionflow rate limiter demo ===\n");

    demo_fixed_window().await?;
    println!("\n{}\n", "=".repeat(50));
    demo_sliding_window().await?;
    println!("\n{}\n", "=".repeat(50));
    demo_token_bucket().await?;

    Ok(())
}

async fn demo_fixed_window() -> Result<(), Box<dyn std::error::Error>> {
    println!("1. FIXED WINDOW");
    println!("   Resets the count at fixed intervals, allows bursts at boundaries.\n");

    let admitted = Arc::new(AtomicUsize::new(0));
    let denied = Arc::new(AtomicUsize::new(0));
    let a = admitted.clone();
    let d = denied.clone();

    let config = RateLimitConfigBuilder::new()
        .name("fixed-demo")
        .fixed_window(Duration::from_secs(1), 5)
        .raise_errors(true)
        .on_admitted(move |_, _| {
            a.fetch_add(1, Ordering::SeqCst);
        })
        .on_denied(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .build()?;
    let limiter = RateLimiter::new(config).await?;

    println!("   Sending 8 requests (limit: 5 per second)...");
    for i in 1..=8 {
        match limiter.increment("demo", &CooperativeWaiter).await {
            Ok(()) => println!("   request {i}: admitted"),
            Err(_) => println!("   request {i}: denied"),
        }
    }

    println!(
        "\n   result: {} admitted, {} denied",
        admitted.load(Ordering::SeqCst),
        denied.load(Ordering::SeqCst)
    );
    Ok(())
}

async fn demo_sliding_window() -> Result<(), Box<dyn std::error::Error>> {
    println!("2. SLIDING WINDOW");
    println!("   Tracks exact request timestamps, no boundary bursts.\n");

    let config = RateLimitConfigBuilder::new()
        .name("sliding-demo")
        .sliding_window(Duration::from_millis(200), 5)
        .raise_errors(true)
        .build()?;
    let limiter = RateLimiter::new(config).await?;

    println!("   Using all 5 permits...");
    for _ in 0..5 {
        limiter.increment("demo", &CooperativeWaiter).await?;
    }
    println!("   Waiting 100ms (half the window)...");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut additional = 0;
    for _ in 0..5 {
        if limiter.increment("demo", &CooperativeWaiter).await.is_ok() {
            additional += 1;
        }
    }
    println!("   additional requests admitted within the half-elapsed window: {additional} (expect 0)");
    Ok(())
}

async fn demo_token_bucket() -> Result<(), Box<dyn std::error::Error>> {
    println!("3. TOKEN BUCKET");
    println!("   Smooths bursts via a capacity that refills at a steady rate.\n");

    let config = RateLimitConfigBuilder::new()
        .name("bucket-demo")
        .token_bucket(5.0, 2.0)
        .raise_errors(true)
        .build()?;
    let limiter = RateLimiter::new(config).await?;

    let mut admitted = 0;
    for _ in 0..8 {
        if limiter.increment("demo", &CooperativeWaiter).await.is_ok() {
            admitted += 1;
        }
    }
    println!("   admitted immediately from a full 5-token bucket: {admitted} (expect 5)");

    println!("   waiting 1s for the bucket to refill by ~2 tokens...");
    tokio::time::sleep(Duration::from_secs(1)).await;
    let refilled = limiter.increment("demo", &CooperativeWaiter).await.is_ok();
    println!("   admitted after refill: {refilled} (expect true)");
    Ok(())
}
