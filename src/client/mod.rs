//! Remote scanner API client

use crate::{MarketMetadata, SampleRow};
use async_trait::async_trait;

pub mod config;
pub mod http;
pub mod rate_limit;

pub use config::ClientConfig;
pub use http::ScannerClient;
pub use rate_limit::RateLimiter;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transient network failure after all retries were exhausted
    #[error("network error: {0}")]
    Network(String),

    /// Client-side error response from the remote API (4xx, not retried)
    #[error("remote API error (status {status}): {message}")]
    RemoteApi {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Malformed, oversized, or unsafe response or input (not retried)
    #[error("security violation: {0}")]
    Security(String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Content types the client will accept from the remote service.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["application/json", "text/plain"];

/// Validate a market/endpoint identifier before URL interpolation.
///
/// Only alphanumerics, dashes, and underscores are allowed; everything else
/// (path separators, dots, shell metacharacters) is rejected so identifiers
/// can never escape the `/{market}/metainfo` and `/{market}/scan` URL slots.
pub fn validate_market_name(market: &str) -> ClientResult<()> {
    if market.is_empty() {
        return Err(ClientError::Security(
            "market identifier cannot be empty".to_string(),
        ));
    }

    if let Some(bad) = market
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(ClientError::Security(format!(
            "market identifier contains forbidden character: {bad:?}"
        )));
    }

    Ok(())
}

/// Interface to the remote scanner service.
///
/// [`ScannerClient`] is the production implementation; the pipeline accepts
/// any implementor so tests can drive it with canned responses.
#[async_trait]
pub trait ScannerApi: Send + Sync {
    /// Fetch field/filter metadata for a market.
    async fn fetch_metainfo(&self, market: &str) -> ClientResult<MarketMetadata>;

    /// Fetch sample scan rows for a market, projected onto `columns`.
    async fn fetch_scan(
        &self,
        market: &str,
        columns: &[String],
        limit: usize,
    ) -> ClientResult<Vec<SampleRow>>;
}
