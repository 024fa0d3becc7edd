//! Sliding-window rate limiting with burst allowance
//!
//! Bounds outbound request rate with two constraints: a minimum interval
//! between consecutive calls (1 / requests-per-second) and a burst budget
//! inside a sliding window. Callers `wait()` before each request; the gate
//! itself is serialized, but released callers proceed in parallel.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Rate limiter with a sliding window, burst allowance, and minimum
/// inter-request interval.
pub struct RateLimiter {
    min_interval: Duration,
    burst_limit: usize,
    window_size: Duration,
    // Timestamps of past calls, oldest first. Entries older than the
    // window are dropped on each wait().
    call_times: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a rate limiter.
    ///
    /// # Arguments
    /// * `requests_per_second` - Sustained rate; sets the minimum interval
    /// * `burst_limit` - Maximum calls inside one window
    /// * `window_size` - Sliding window length
    pub fn new(requests_per_second: u32, burst_limit: usize, window_size: Duration) -> Self {
        let rate = requests_per_second.max(1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / f64::from(rate)),
            burst_limit: burst_limit.max(1),
            window_size,
            call_times: Mutex::new(VecDeque::new()),
        }
    }

    /// The minimum interval enforced between consecutive calls.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend the caller until both the burst budget and the minimum
    /// interval are satisfied, then record the call as having happened now.
    ///
    /// Holding the internal lock across the sleeps serializes waiting
    /// callers, so each released caller observes the bookkeeping of every
    /// call released before it.
    pub async fn wait(&self) {
        let mut call_times = self.call_times.lock().await;

        let now = Instant::now();
        Self::drop_aged(&mut call_times, now, self.window_size);

        if call_times.len() >= self.burst_limit {
            // Window is full: sleep until the oldest entry ages out.
            if let Some(oldest) = call_times.front().copied() {
                let wake_at = oldest + self.window_size;
                let delay = wake_at.saturating_duration_since(now);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            let now = Instant::now();
            Self::drop_aged(&mut call_times, now, self.window_size);
        }

        if let Some(last) = call_times.back().copied() {
            let since_last = Instant::now().saturating_duration_since(last);
            if since_last < self.min_interval {
                sleep(self.min_interval - since_last).await;
            }
        }

        call_times.push_back(Instant::now());
    }

    /// Number of calls currently inside the window.
    pub async fn in_flight_window(&self) -> usize {
        let mut call_times = self.call_times.lock().await;
        let now = Instant::now();
        Self::drop_aged(&mut call_times, now, self.window_size);
        call_times.len()
    }

    fn drop_aged(call_times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = call_times.front() {
            if now.saturating_duration_since(*front) > window {
                call_times.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_budget_does_not_block() {
        // High rate so the min-interval constraint is negligible
        let limiter = RateLimiter::new(1000, 5, Duration::from_secs(1));

        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        // 5 calls at 1000 rps: ~4ms of min-interval spacing at most
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.in_flight_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_over_burst_blocks_until_window_ages() {
        let limiter = RateLimiter::new(1000, 5, Duration::from_secs(1));

        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }

        // Call #6 must wait until the oldest of the first five leaves the
        // 1-second window.
        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_secs(1),
            "sixth call completed after {:?}, expected >= 1s",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_enforced() {
        // 2 rps => 500ms between calls; burst budget is not the constraint
        let limiter = RateLimiter::new(2, 100, Duration::from_secs(60));

        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(
            start.elapsed() >= Duration::from_millis(1000),
            "three calls at 2 rps took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_drains_over_time() {
        let limiter = RateLimiter::new(1000, 3, Duration::from_millis(200));

        for _ in 0..3 {
            limiter.wait().await;
        }
        assert_eq!(limiter.in_flight_window().await, 3);

        sleep(Duration::from_millis(250)).await;
        assert_eq!(limiter.in_flight_window().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(1000, 4, Duration::from_secs(1)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.wait().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 8 calls against a budget of 4 per second needs at least one
        // full window of waiting.
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
