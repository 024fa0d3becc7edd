//! Client configuration constants and retry delay calculation

use std::time::Duration;

/// Default base URL of the scanner service.
pub const DEFAULT_BASE_URL: &str = "https://scanner.tradingview.com";

/// Default sustained request rate.
/// 2 requests/second stays comfortably inside the remote's observed limits
/// while keeping a full-market refresh under a few minutes.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;

/// Default burst allowance inside one sliding window.
pub const DEFAULT_BURST_LIMIT: usize = 10;

/// Default sliding window length for burst accounting.
pub const DEFAULT_WINDOW_SIZE: Duration = Duration::from_secs(60);

/// Default maximum number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retries. The effective delay grows linearly
/// with the attempt number (1s, 2s, 3s, ...).
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling on response body size.
/// Metainfo documents for the largest markets are under 2 MiB; anything
/// bigger than 8 MiB is treated as a hostile or broken response.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Configuration for [`super::ScannerClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the scanner service
    pub base_url: String,
    /// Sustained request rate (sets the minimum inter-request interval)
    pub requests_per_second: u32,
    /// Maximum calls inside one sliding window
    pub burst_limit: usize,
    /// Sliding window length
    pub window_size: Duration,
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Base delay between retries
    pub retry_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Ceiling on response body size in bytes
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst_limit: DEFAULT_BURST_LIMIT,
            window_size: DEFAULT_WINDOW_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Calculate the retry delay for a 1-indexed attempt number.
///
/// Delays grow linearly with the attempt (`retry_delay * attempt`), which
/// is enough to ride out the remote's short throttling windows without the
/// long tail a doubling schedule would add.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}
