//! Scanner HTTP client
//!
//! Provides the production [`ScannerApi`] implementation with:
//! - Rate limit integration (each attempt re-enters the gate)
//! - Retry logic with linearly growing backoff
//! - Strict response validation (content-type allow-list, size ceiling)
//! - Endpoint identifier validation before URL interpolation

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::config::{retry_delay, ClientConfig};
use crate::client::rate_limit::RateLimiter;
use crate::client::{
    validate_market_name, ClientError, ClientResult, ScannerApi, ALLOWED_CONTENT_TYPES,
};
use crate::metrics;
use crate::{FieldDefinition, FilterDefinition, MarketMetadata, SampleRow};

/// HTTP client for the scanner service.
pub struct ScannerClient {
    client: Client,
    config: ClientConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl ScannerClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    /// Returns [`ClientError::Security`] if the base URL is not a valid
    /// http(s) URL, and [`ClientError::Network`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Security(format!("invalid base URL: {e}")))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ClientError::Security(format!(
                "unsupported base URL scheme: {}",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("scanner-spec-generator/", env!("CARGO_PKG_VERSION")))
            // The scanner never redirects; do not follow 3xx
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = Arc::new(RateLimiter::new(
            config.requests_per_second,
            config.burst_limit,
            config.window_size,
        ));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Create a client sharing an externally owned rate limiter.
    ///
    /// The pipeline passes its process-wide limiter here so every caller
    /// goes through the same gate.
    pub fn with_rate_limiter(
        config: ClientConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> ClientResult<Self> {
        let mut client = Self::new(config)?;
        client.rate_limiter = rate_limiter;
        Ok(client)
    }

    /// The shared rate limiter used by this client.
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.rate_limiter)
    }

    /// Execute a request with retry, returning the decoded JSON body.
    ///
    /// Retries on network errors, timeouts, 429, and 5xx. Does not retry
    /// on other 4xx responses or on security violations. The rate-limiter
    /// gate is re-entered on every attempt, never held across a backoff
    /// sleep.
    async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            self.rate_limiter.wait().await;

            let mut request = self.client.request(method.clone(), url);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts = self.config.max_retries + 1,
                        error = %e,
                        "Network error"
                    );
                    metrics::record_http_request(url, "network_error");
                    last_error = Some(ClientError::Network(e.to_string()));
                    if attempt < self.config.max_retries {
                        self.backoff(attempt + 1).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            metrics::record_http_request(url, status.as_str());

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(
                    url,
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    max_attempts = self.config.max_retries + 1,
                    "Retryable error response"
                );
                last_error = Some(ClientError::Network(format!("server error: {status}")));
                if attempt < self.config.max_retries {
                    self.backoff(attempt + 1).await;
                    continue;
                }
                break;
            }

            if status.is_client_error() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(ClientError::RemoteApi {
                    status: status.as_u16(),
                    message,
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            validate_content_type(&content_type)?;

            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(url, error = %e, "Failed to read response body");
                    last_error = Some(ClientError::Network(e.to_string()));
                    if attempt < self.config.max_retries {
                        self.backoff(attempt + 1).await;
                        continue;
                    }
                    break;
                }
            };

            if bytes.len() > self.config.max_response_bytes {
                return Err(ClientError::Security(format!(
                    "response too large: {} bytes (max {})",
                    bytes.len(),
                    self.config.max_response_bytes
                )));
            }

            debug!(url, bytes = bytes.len(), attempt = attempt + 1, "Request succeeded");
            return serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::Parse(format!("failed to decode response: {e}")));
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Network("all retries exhausted".to_string())))
    }

    async fn backoff(&self, attempt: u32) {
        let delay = retry_delay(self.config.retry_delay, attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
        metrics::record_http_retry(attempt, delay);
        tokio::time::sleep(delay).await;
    }

    /// Test whether a single field returns data for a symbol.
    ///
    /// Useful for probing speculative/undocumented field names against the
    /// live service.
    pub async fn probe_field(
        &self,
        market: &str,
        symbol: &str,
        field: &str,
    ) -> ClientResult<bool> {
        validate_market_name(market)?;
        let url = format!("{}/{}/scan", self.config.base_url, market);
        let body = build_probe_request(market, symbol, field);
        let value = self.request_with_retry(Method::POST, &url, Some(&body)).await?;

        let rows = decode_scan(value)?;
        Ok(rows
            .first()
            .and_then(|row| row.values.first())
            .map(|v| !v.is_null())
            .unwrap_or(false))
    }
}

#[async_trait]
impl ScannerApi for ScannerClient {
    async fn fetch_metainfo(&self, market: &str) -> ClientResult<MarketMetadata> {
        validate_market_name(market)?;
        let url = format!("{}/{}/metainfo", self.config.base_url, market);
        debug!(market, url, "Fetching metainfo");

        let value = self.request_with_retry(Method::GET, &url, None).await?;
        let metadata = decode_metainfo(value)?;
        metadata
            .validate()
            .map_err(|e| ClientError::Parse(format!("invalid metainfo for {market}: {e}")))?;
        Ok(metadata)
    }

    async fn fetch_scan(
        &self,
        market: &str,
        columns: &[String],
        limit: usize,
    ) -> ClientResult<Vec<SampleRow>> {
        validate_market_name(market)?;
        let url = format!("{}/{}/scan", self.config.base_url, market);
        debug!(market, url, columns = columns.len(), limit, "Fetching scan sample");

        let body = build_scan_request(market, columns, limit);
        let value = self.request_with_retry(Method::POST, &url, Some(&body)).await?;
        decode_scan(value)
    }
}

/// Check a response content type against the allow-list.
pub fn validate_content_type(content_type: &str) -> ClientResult<()> {
    let lowered = content_type.to_lowercase();
    if ALLOWED_CONTENT_TYPES.iter().any(|ct| lowered.contains(ct)) {
        Ok(())
    } else {
        Err(ClientError::Security(format!(
            "unexpected content type: {content_type:?}"
        )))
    }
}

/// Build the scan request body for sampling `limit` tickers projected onto
/// `columns`.
pub fn build_scan_request(market: &str, columns: &[String], limit: usize) -> Value {
    json!({
        "filter": [],
        "options": {"lang": "en"},
        "range": [0, limit],
        "markets": [market],
        "symbols": {"query": {"types": []}},
        "columns": columns,
        "sort": {"sortBy": "name", "sortOrder": "asc"},
    })
}

/// Build a scan request that probes one field for one symbol.
pub fn build_probe_request(market: &str, symbol: &str, field: &str) -> Value {
    json!({
        "filter": [{"left": "name", "operation": "equal", "right": symbol}],
        "options": {"lang": "en"},
        "range": [0, 1],
        "markets": [market],
        "symbols": {"query": {"types": []}},
        "columns": [field],
        "sort": {"sortBy": "name", "sortOrder": "asc"},
    })
}

/// Decode a metainfo response.
///
/// The remote is inconsistent here: most markets return an envelope
/// `{"fields": [...], "filters": ...}`, a few return the bare field array.
/// Filters arrive either as a list or as a map keyed by filter name.
pub fn decode_metainfo(value: Value) -> ClientResult<MarketMetadata> {
    if value.is_array() {
        let fields: Vec<FieldDefinition> = serde_json::from_value(value)
            .map_err(|e| ClientError::Parse(format!("invalid field list: {e}")))?;
        return Ok(MarketMetadata::from_fields(fields));
    }

    #[derive(Deserialize)]
    struct Envelope {
        fields: Vec<FieldDefinition>,
        #[serde(default)]
        filters: Option<Value>,
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| ClientError::Parse(format!("invalid metainfo envelope: {e}")))?;
    let filters = envelope
        .filters
        .map(decode_filters)
        .transpose()?
        .unwrap_or_default();

    Ok(MarketMetadata {
        fields: envelope.fields,
        filters,
    })
}

fn decode_filters(value: Value) -> ClientResult<Vec<FilterDefinition>> {
    match value {
        Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| ClientError::Parse(format!("invalid filter list: {e}"))),
        Value::Object(map) => {
            let mut filters = Vec::with_capacity(map.len());
            for (name, entry) in map {
                let kind = entry
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("text")
                    .to_string();
                let required = entry
                    .get("required")
                    .and_then(|r| r.as_bool())
                    .unwrap_or(false);
                filters.push(FilterDefinition {
                    name,
                    kind: kind.into(),
                    required,
                });
            }
            Ok(filters)
        }
        Value::Null => Ok(Vec::new()),
        other => Err(ClientError::Parse(format!(
            "unexpected filters encoding: {other}"
        ))),
    }
}

/// Decode a scan response (`{"data": [{"s": ..., "d": [...]}], ...}`) into
/// sample rows.
pub fn decode_scan(value: Value) -> ClientResult<Vec<SampleRow>> {
    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        data: Vec<Entry>,
    }

    #[derive(Deserialize)]
    struct Entry {
        s: String,
        #[serde(default)]
        d: Vec<Value>,
    }

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| ClientError::Parse(format!("invalid scan response: {e}")))?;

    Ok(envelope
        .data
        .into_iter()
        .map(|entry| SampleRow {
            symbol: entry.s,
            values: entry.d,
        })
        .collect())
}
