//! Pipeline orchestrator
//!
//! Drives each market through `Fetching → Generating → Validating →
//! Persisted`, consulting the cache before the remote client, persisting
//! raw data and the final document, and recording metrics. Markets run on
//! a bounded worker pool; results are aggregated by market key.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::cache::MultiLevelCache;
use crate::client::{ScannerApi, ScannerClient};
use crate::metrics::{GenerationRecord, MarketGenerationMetrics, MetricsCollector};
use crate::pipeline::report::{GenerationResult, MarketStage, RunReport};
use crate::pipeline::{PipelineConfig, PipelineError, PipelineResult};
use crate::schema::document::{build_document, build_fields_schema};
use crate::schema::{GeneratedFields, SchemaGenerator};
use crate::shutdown::SharedShutdown;
use crate::storage::FileManager;
use crate::validator::Validator;
use crate::{MarketMetadata, SampleDocument};

struct MarketOutcome {
    fields_processed: usize,
    coverage_ratio: f64,
    warnings: Vec<String>,
}

/// Per-market spec generation orchestrator.
///
/// Cheap to clone: shares the client, cache, file manager, and metrics
/// collector across worker tasks.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    client: Arc<dyn ScannerApi>,
    cache: Arc<MultiLevelCache>,
    files: Arc<FileManager>,
    generator: SchemaGenerator,
    validator: Validator,
    collector: Arc<MetricsCollector>,
    shutdown: Option<SharedShutdown>,
}

impl Pipeline {
    /// Create a pipeline with the production HTTP client.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let client = ScannerClient::new(config.client_config())?;
        Self::with_client(config, Arc::new(client))
    }

    /// Create a pipeline with a caller-supplied client implementation.
    ///
    /// Used by tests to drive the pipeline with canned responses.
    pub fn with_client(
        config: PipelineConfig,
        client: Arc<dyn ScannerApi>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let files = Arc::new(
            FileManager::new(&config.data_dir, &config.specs_dir)
                .map_err(|e| PipelineError::Configuration(e.to_string()))?,
        );
        let cache = Arc::new(MultiLevelCache::new(&config.cache_dir));
        let generator = SchemaGenerator::new(config.generator_options());
        let validator = Validator::new(config.strictness);

        crate::metrics::warn_if_memory_unavailable();

        Ok(Self {
            config,
            client,
            cache,
            files,
            generator,
            validator,
            collector: Arc::new(MetricsCollector::new()),
            shutdown: crate::shutdown::get_global_shutdown(),
        })
    }

    /// Attach a shutdown handle for run-level cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shared metrics collector.
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.collector)
    }

    /// The shared multi-level cache.
    pub fn cache(&self) -> Arc<MultiLevelCache> {
        Arc::clone(&self.cache)
    }

    /// The file manager.
    pub fn files(&self) -> Arc<FileManager> {
        Arc::clone(&self.files)
    }

    /// Generate and persist specs for all given markets.
    ///
    /// Markets run concurrently up to `max_concurrency`; one market's
    /// failure never aborts the others. Results are keyed by market, not
    /// completion order.
    pub async fn run(&self, markets: &[String]) -> RunReport {
        info!(
            markets = markets.len(),
            max_concurrency = self.config.max_concurrency,
            "Starting generation run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut join_set: JoinSet<GenerationResult> = JoinSet::new();
        let mut report = RunReport::new();

        for market in markets {
            if self.is_cancelled() {
                warn!(market = %market, "Run cancelled before market started");
                report.insert(self.record_skipped(market, "run cancelled before start"));
                continue;
            }

            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let market = market.clone();
            join_set.spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => pipeline.run_market(&market).await,
                    Err(_) => pipeline.record_skipped(&market, "worker pool closed"),
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => {
                    report.insert(result);
                }
                Err(e) => error!(error = %e, "Market worker task failed"),
            }
        }

        info!("{}", report.summary_line());
        report
    }

    /// Run the full stage sequence for one market, catching every
    /// market-scoped error into the result.
    pub async fn run_market(&self, market: &str) -> GenerationResult {
        let guard = MarketGenerationMetrics::start(market);
        let mut stage = MarketStage::Pending;

        let outcome = self
            .advance_market(market, &mut stage)
            .instrument(info_span!("market_pipeline", market = %market))
            .await;

        let duration_secs = guard.elapsed().as_secs_f64();
        let memory_delta_bytes = guard.memory_delta();

        let result = match outcome {
            Ok(outcome) => {
                guard.record_success(outcome.fields_processed);
                GenerationResult {
                    market: market.to_string(),
                    stage: MarketStage::Persisted,
                    success: true,
                    fields_processed: outcome.fields_processed,
                    coverage_ratio: outcome.coverage_ratio,
                    errors: Vec::new(),
                    warnings: outcome.warnings,
                    duration_secs,
                    memory_delta_bytes,
                }
            }
            Err(e) => {
                guard.record_failure(&e.to_string());
                warn!(market = %market, failed_stage = %stage, error = %e, "Market failed");
                GenerationResult {
                    market: market.to_string(),
                    stage: MarketStage::Failed,
                    success: false,
                    fields_processed: 0,
                    coverage_ratio: 0.0,
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                    duration_secs,
                    memory_delta_bytes,
                }
            }
        };

        self.collector.record(GenerationRecord {
            market: result.market.clone(),
            success: result.success,
            fields_processed: result.fields_processed,
            duration_secs: result.duration_secs,
            memory_delta_bytes: result.memory_delta_bytes,
        });

        result
    }

    async fn advance_market(
        &self,
        market: &str,
        stage: &mut MarketStage,
    ) -> PipelineResult<MarketOutcome> {
        self.ensure_not_cancelled(market)?;
        *stage = MarketStage::Fetching;
        debug!(market = %market, "Stage: fetching");
        let (metadata, samples) = self.fetch_market_data(market).await?;

        self.ensure_not_cancelled(market)?;
        *stage = MarketStage::Generating;
        debug!(market = %market, fields = metadata.fields.len(), "Stage: generating");
        let generated = self.generator.generate(market, &metadata, &samples)?;
        for warning in &generated.warnings {
            warn!(market = %market, "{warning}");
        }

        self.ensure_not_cancelled(market)?;
        *stage = MarketStage::Validating;
        debug!(market = %market, "Stage: validating");
        self.validate_generated(market, &generated)?;

        // The current stage always finishes before cancellation takes
        // effect, so the persist step runs as one unit: no partial writes.
        self.ensure_not_cancelled(market)?;
        let document = build_document(market, &generated, &metadata, &self.config.base_url);
        self.files
            .save_spec(market, &document, self.config.output_format)
            .await?;
        *stage = MarketStage::Persisted;
        info!(
            market = %market,
            coverage = generated.coverage_ratio,
            fields = generated.fragments.len(),
            "Spec persisted"
        );

        Ok(MarketOutcome {
            fields_processed: generated.fragments.len(),
            coverage_ratio: generated.coverage_ratio,
            warnings: generated.warnings,
        })
    }

    /// Load metainfo and scan samples, consulting the cache before the
    /// remote client and writing fetched data back to cache and disk.
    async fn fetch_market_data(
        &self,
        market: &str,
    ) -> PipelineResult<(MarketMetadata, SampleDocument)> {
        let metadata = self.load_metainfo(market).await?;

        let mut columns = metadata.field_names();
        columns.truncate(self.config.sample_columns);
        let samples = self.load_samples(market, columns).await?;

        Ok((metadata, samples))
    }

    async fn load_metainfo(&self, market: &str) -> PipelineResult<MarketMetadata> {
        let key = format!("metainfo:{market}");

        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value::<MarketMetadata>(value) {
                Ok(metadata) => {
                    debug!(market = %market, "Metainfo served from cache");
                    return Ok(metadata);
                }
                Err(e) => {
                    warn!(market = %market, error = %e, "Cached metainfo undecodable, refetching");
                    self.cache.delete(&key).await;
                }
            }
        }

        let metadata = self.client.fetch_metainfo(market).await?;

        if let Ok(value) = serde_json::to_value(&metadata) {
            self.cache.set(&key, value, None).await;
        }
        self.files.save_metainfo(market, &metadata).await?;

        Ok(metadata)
    }

    async fn load_samples(
        &self,
        market: &str,
        columns: Vec<String>,
    ) -> PipelineResult<SampleDocument> {
        let key = format!("scan:{market}");

        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value::<SampleDocument>(value) {
                Ok(samples) => {
                    debug!(market = %market, "Scan sample served from cache");
                    return Ok(samples);
                }
                Err(e) => {
                    warn!(market = %market, error = %e, "Cached scan sample undecodable, refetching");
                    self.cache.delete(&key).await;
                }
            }
        }

        let rows = self
            .client
            .fetch_scan(market, &columns, self.config.sample_limit)
            .await?;

        // Rows misaligned with the projection cannot be indexed safely
        let rows = rows
            .into_iter()
            .filter(|row| match row.validate(&columns) {
                Ok(()) => true,
                Err(e) => {
                    warn!(market = %market, "{e}");
                    false
                }
            })
            .collect();

        let samples = SampleDocument { columns, rows };

        if let Ok(value) = serde_json::to_value(&samples) {
            self.cache.set(&key, value, None).await;
        }
        self.files.save_scan(market, &samples).await?;

        Ok(samples)
    }

    fn validate_generated(
        &self,
        market: &str,
        generated: &GeneratedFields,
    ) -> PipelineResult<()> {
        for fragment in &generated.fragments {
            if !self.validator.validate_schema(&fragment.to_schema()) {
                return Err(PipelineError::Validation(format!(
                    "fragment {} failed structural validation",
                    fragment.name
                )));
            }
        }

        let fields_schema = build_fields_schema(generated);
        if !self.validator.validate_schema(&fields_schema) {
            return Err(PipelineError::Validation(format!(
                "fields schema for {market} failed structural validation"
            )));
        }

        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    fn ensure_not_cancelled(&self, market: &str) -> PipelineResult<()> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled(format!(
                "run cancelled before next stage for {market}"
            )));
        }
        Ok(())
    }

    fn record_skipped(&self, market: &str, reason: &str) -> GenerationResult {
        let result = GenerationResult {
            market: market.to_string(),
            stage: MarketStage::Failed,
            success: false,
            fields_processed: 0,
            coverage_ratio: 0.0,
            errors: vec![format!("cancelled: {reason}")],
            warnings: Vec::new(),
            duration_secs: 0.0,
            memory_delta_bytes: None,
        };
        self.collector.record(GenerationRecord {
            market: result.market.clone(),
            success: false,
            fields_processed: 0,
            duration_secs: 0.0,
            memory_delta_bytes: None,
        });
        result
    }
}
