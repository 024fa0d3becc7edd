//! Integration tests for rate limiting behavior

use scanner_spec_generator::client::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_burst_budget_admits_up_to_limit_immediately() {
    let limiter = RateLimiter::new(1000, 5, Duration::from_secs(1));

    let start = Instant::now();
    for _ in 0..5 {
        limiter.wait().await;
    }
    assert!(
        start.elapsed() < Duration::from_millis(100),
        "calls within the burst budget should not block, took {:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn test_sixth_call_blocks_for_remaining_window() {
    let limiter = RateLimiter::new(1000, 5, Duration::from_secs(1));

    let start = Instant::now();
    for _ in 0..5 {
        limiter.wait().await;
    }
    let elapsed_before_blocked_call = start.elapsed();
    assert!(elapsed_before_blocked_call < Duration::from_millis(100));

    limiter.wait().await;

    // Call #6 must have waited out the remainder of the window
    assert!(
        start.elapsed() >= Duration::from_secs(1),
        "sixth call returned after {:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn test_minimum_interval_spacing() {
    // 4 rps => 250ms minimum spacing
    let limiter = RateLimiter::new(4, 100, Duration::from_secs(60));
    assert_eq!(limiter.min_interval(), Duration::from_millis(250));

    let start = Instant::now();
    for _ in 0..5 {
        limiter.wait().await;
    }
    assert!(
        start.elapsed() >= Duration::from_millis(1000),
        "five calls at 4 rps took only {:?}",
        start.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn test_released_callers_proceed_in_parallel() {
    // Callers serialize through the gate but the gate never deadlocks a
    // full set of concurrent waiters.
    let limiter = Arc::new(RateLimiter::new(1000, 10, Duration::from_secs(1)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            limiter.wait().await;
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(limiter.in_flight_window().await, 10);
}
