//! Generation observability metrics
//!
//! Collects per-market generation outcomes for the run report and emits
//! process-wide counters/histograms for HTTP traffic, retries, cache
//! activity, and generation results.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate for low-overhead metric emission
//! - Optional Prometheus exporter for a scrape endpoint
//! - An in-process [`MetricsCollector`] aggregates per-market records into
//!   the run-level summary
//! - Graceful degradation if no metrics sink is installed

use metrics::{
    counter, describe_counter, describe_histogram, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<Mutex<bool>>> = Lazy::new(|| Arc::new(Mutex::new(false)));

/// Initialize the metrics system with a Prometheus exporter.
///
/// Call once at application startup; subsequent calls are no-ops. The
/// library works without this - metric emissions just go nowhere.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED
        .lock()
        .map_err(|e| format!("metrics init lock poisoned: {e}"))?;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "scanner_http_requests_total",
        Unit::Count,
        "Total HTTP requests made to the scanner API"
    );

    describe_counter!(
        "scanner_http_retries_total",
        Unit::Count,
        "Total HTTP retry attempts"
    );

    describe_histogram!(
        "scanner_retry_backoff_seconds",
        Unit::Seconds,
        "Duration of retry backoff sleeps"
    );

    describe_counter!(
        "spec_generations_completed_total",
        Unit::Count,
        "Markets whose spec generation completed successfully"
    );

    describe_counter!(
        "spec_generations_failed_total",
        Unit::Count,
        "Markets whose spec generation failed"
    );

    describe_histogram!(
        "spec_generation_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of one market's generation"
    );

    describe_counter!(
        "cache_hits_total",
        Unit::Count,
        "Multi-level cache hits by tier"
    );

    describe_counter!(
        "cache_misses_total",
        Unit::Count,
        "Multi-level cache misses"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether the metrics system has been initialized.
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.lock().map(|g| *g).unwrap_or(false)
}

/// Record one HTTP request with its outcome label (status code or
/// "network_error").
pub fn record_http_request(endpoint: &str, outcome: &str) {
    counter!(
        "scanner_http_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

/// Record a retry attempt and its backoff duration.
pub fn record_http_retry(attempt: u32, delay: Duration) {
    counter!(
        "scanner_http_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!("scanner_retry_backoff_seconds").record(delay.as_secs_f64());
}

/// Record a cache lookup outcome. `tier` is "memory", "disk", or
/// "response"; a miss across all tiers uses [`record_cache_miss`].
pub fn record_cache_hit(tier: &'static str) {
    counter!("cache_hits_total", "tier" => tier).increment(1);
}

/// Record a lookup that missed every tier.
pub fn record_cache_miss() {
    counter!("cache_misses_total").increment(1);
}

/// Best-effort resident set size in bytes, from `/proc/self/status`.
/// Returns `None` on platforms without procfs.
pub fn current_rss_bytes() -> Option<i64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: i64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// One market's recorded generation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRecord {
    /// Market identifier
    pub market: String,
    /// Whether generation succeeded
    pub success: bool,
    /// Fields processed
    pub fields_processed: usize,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// Resident-set delta in bytes, if measurable
    pub memory_delta_bytes: Option<i64>,
}

/// Aggregated summary over all recorded generations.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Number of markets recorded
    pub total_generations: usize,
    /// Successful generations
    pub successful: usize,
    /// Failed generations
    pub failed: usize,
    /// successful / total (0.0 when nothing was recorded)
    pub success_rate: f64,
    /// Sum of all durations in seconds
    pub total_duration_secs: f64,
    /// Mean duration in seconds
    pub avg_duration_secs: f64,
    /// Total fields processed across all markets
    pub total_fields_processed: usize,
    /// Largest observed memory delta in bytes
    pub max_memory_delta_bytes: Option<i64>,
}

/// Collector for per-market generation records.
///
/// Shared across the worker pool; records arrive in completion order and
/// are aggregated by the summary, so ordering does not matter.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    records: Mutex<Vec<GenerationRecord>>,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one market's outcome.
    pub fn record(&self, record: GenerationRecord) {
        if record.success {
            counter!(
                "spec_generations_completed_total",
                "market" => record.market.clone(),
            )
            .increment(1);
        } else {
            counter!(
                "spec_generations_failed_total",
                "market" => record.market.clone(),
            )
            .increment(1);
        }
        histogram!("spec_generation_duration_seconds").record(record.duration_secs);

        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    /// All records so far, in completion order.
    pub fn records(&self) -> Vec<GenerationRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Aggregate all records into a run summary.
    pub fn summary(&self) -> RunSummary {
        let records = self.records();
        let total = records.len();
        let successful = records.iter().filter(|r| r.success).count();
        let total_duration: f64 = records.iter().map(|r| r.duration_secs).sum();

        RunSummary {
            total_generations: total,
            successful,
            failed: total - successful,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
            total_duration_secs: total_duration,
            avg_duration_secs: if total > 0 {
                total_duration / total as f64
            } else {
                0.0
            },
            total_fields_processed: records.iter().map(|r| r.fields_processed).sum(),
            max_memory_delta_bytes: records.iter().filter_map(|r| r.memory_delta_bytes).max(),
        }
    }

    /// Drop all records.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

/// Timing/memory guard for one market's generation.
pub struct MarketGenerationMetrics {
    market: String,
    start_time: Instant,
    start_rss: Option<i64>,
}

impl MarketGenerationMetrics {
    /// Start tracking a market's generation.
    pub fn start(market: impl Into<String>) -> Self {
        let market = market.into();
        info!(market = %market, "Spec generation started");

        Self {
            market,
            start_time: Instant::now(),
            start_rss: current_rss_bytes(),
        }
    }

    /// Elapsed wall-clock time since the guard was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Resident-set delta since the guard was created, if measurable.
    pub fn memory_delta(&self) -> Option<i64> {
        Some(current_rss_bytes()? - self.start_rss?)
    }

    /// Log a successful completion.
    pub fn record_success(&self, fields_processed: usize) {
        info!(
            market = %self.market,
            fields_processed,
            duration_ms = self.elapsed().as_millis() as u64,
            "Spec generation completed successfully"
        );
    }

    /// Log a failure.
    pub fn record_failure(&self, error: &str) {
        error!(
            market = %self.market,
            error = %error,
            duration_ms = self.elapsed().as_millis() as u64,
            "Spec generation failed"
        );
    }
}

/// Log a warning when memory accounting is unavailable. Called once by the
/// pipeline at startup on non-procfs platforms.
pub fn warn_if_memory_unavailable() {
    if current_rss_bytes().is_none() {
        warn!("Resident-set accounting unavailable on this platform; memory deltas will be absent");
    }
}
