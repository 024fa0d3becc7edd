//! Pipeline configuration surface

use std::path::PathBuf;
use std::time::Duration;

use crate::client::config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_BURST_LIMIT, DEFAULT_MAX_RESPONSE_BYTES,
    DEFAULT_MAX_RETRIES, DEFAULT_REQUESTS_PER_SECOND, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_DELAY, DEFAULT_WINDOW_SIZE,
};
use crate::pipeline::{PipelineError, PipelineResult};
use crate::schema::GeneratorOptions;
use crate::storage::OutputFormat;
use crate::validator::StrictnessPolicy;

/// Default number of markets processed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default number of tickers sampled per market.
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Default cap on how many columns one scan request projects. Keeps scan
/// requests well under the remote's payload limits for field-heavy markets.
pub const DEFAULT_SAMPLE_COLUMNS: usize = 25;

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the scanner service
    pub base_url: String,
    /// Sustained request rate
    pub requests_per_second: u32,
    /// Burst allowance inside one sliding window
    pub burst_limit: usize,
    /// Sliding window length
    pub window_size: Duration,
    /// Maximum retries for transient remote failures
    pub max_retries: u32,
    /// Base delay between retries
    pub retry_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Pass type-mismatched enums through instead of dropping them
    pub skip_enum_validation: bool,
    /// Enforce the 0.8 example-coverage gate
    pub require_examples: bool,
    /// Markets processed concurrently
    pub max_concurrency: usize,
    /// Tickers sampled per market
    pub sample_limit: usize,
    /// Columns projected per scan request
    pub sample_columns: usize,
    /// Root for raw metainfo/scan data
    pub data_dir: PathBuf,
    /// Root for generated spec documents
    pub specs_dir: PathBuf,
    /// Root for the disk cache tier
    pub cache_dir: PathBuf,
    /// Output document format
    pub output_format: OutputFormat,
    /// Validator strictness policy
    pub strictness: StrictnessPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst_limit: DEFAULT_BURST_LIMIT,
            window_size: DEFAULT_WINDOW_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            skip_enum_validation: false,
            require_examples: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            sample_columns: DEFAULT_SAMPLE_COLUMNS,
            data_dir: PathBuf::from("data"),
            specs_dir: PathBuf::from("specs"),
            cache_dir: PathBuf::from("cache"),
            output_format: OutputFormat::Json,
            strictness: StrictnessPolicy::Standard,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration values. Failures here are run-fatal.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_concurrency == 0 {
            return Err(PipelineError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(PipelineError::Configuration(
                "requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.burst_limit == 0 {
            return Err(PipelineError::Configuration(
                "burst_limit must be at least 1".to_string(),
            ));
        }
        if self.sample_limit == 0 {
            return Err(PipelineError::Configuration(
                "sample_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Derive the remote client configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            requests_per_second: self.requests_per_second,
            burst_limit: self.burst_limit,
            window_size: self.window_size,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            request_timeout: self.request_timeout,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Derive the schema generator options.
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            skip_enum_validation: self.skip_enum_validation,
            require_examples: self.require_examples,
        }
    }
}
