//! Integration tests for pipeline orchestration: failure isolation,
//! caching, cancellation, and the coverage gate.

use async_trait::async_trait;
use scanner_spec_generator::client::{ClientError, ClientResult, ScannerApi};
use scanner_spec_generator::pipeline::{MarketStage, Pipeline, PipelineConfig};
use scanner_spec_generator::shutdown::{ShutdownCoordinator, SharedShutdown};
use scanner_spec_generator::storage::OutputFormat;
use scanner_spec_generator::{
    EnumValue, FieldDefinition, FieldKind, MarketMetadata, SampleRow,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Canned scanner returning the same two-field metainfo for every market.
/// Markets in `failing` behave like the remote after all retries were
/// exhausted; `shutdown_on` requests shutdown when the named market's
/// metainfo is fetched.
struct MockScanner {
    failing: HashSet<String>,
    shutdown_on: Option<(String, SharedShutdown)>,
    metainfo_calls: AtomicUsize,
}

impl MockScanner {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|m| m.to_string()).collect(),
            shutdown_on: None,
            metainfo_calls: AtomicUsize::new(0),
        }
    }

    fn with_shutdown_on(market: &str, shutdown: SharedShutdown) -> Self {
        Self {
            failing: HashSet::new(),
            shutdown_on: Some((market.to_string(), shutdown)),
            metainfo_calls: AtomicUsize::new(0),
        }
    }

    fn metainfo_calls(&self) -> usize {
        self.metainfo_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScannerApi for MockScanner {
    async fn fetch_metainfo(&self, market: &str) -> ClientResult<MarketMetadata> {
        self.metainfo_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((trigger, shutdown)) = &self.shutdown_on {
            if market == trigger {
                shutdown.request_shutdown();
            }
        }

        if self.failing.contains(market) {
            return Err(ClientError::Network(
                "connection reset after all retries".to_string(),
            ));
        }

        Ok(MarketMetadata::from_fields(vec![
            FieldDefinition::new("close", FieldKind::Number),
            FieldDefinition {
                name: "status".to_string(),
                kind: FieldKind::Text,
                enum_values: Some(vec![
                    EnumValue::Scalar(json!("BUY")),
                    EnumValue::Scalar(json!("SELL")),
                ]),
                description: None,
                example: None,
            },
        ]))
    }

    async fn fetch_scan(
        &self,
        _market: &str,
        columns: &[String],
        _limit: usize,
    ) -> ClientResult<Vec<SampleRow>> {
        let values: Vec<Value> = columns
            .iter()
            .map(|column| match column.as_str() {
                "close" => json!(101.5),
                "status" => json!("BUY"),
                _ => Value::Null,
            })
            .collect();

        Ok(vec![SampleRow {
            symbol: "BINANCE:BTCUSDT".to_string(),
            values,
        }])
    }
}

fn test_config(root: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        data_dir: root.join("data"),
        specs_dir: root.join("specs"),
        cache_dir: root.join("cache"),
        max_concurrency: 2,
        ..PipelineConfig::default()
    }
}

fn markets(names: &[&str]) -> Vec<String> {
    names.iter().map(|m| m.to_string()).collect()
}

#[tokio::test]
async fn test_partial_failure_isolates_markets() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&["bravo"]));
    let pipeline = Pipeline::with_client(test_config(dir.path()), scanner).unwrap();

    let report = pipeline
        .run(&markets(&["alpha", "bravo", "charlie"]))
        .await;

    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 1);

    let alpha = report.get("alpha").unwrap();
    assert!(alpha.success);
    assert_eq!(alpha.stage, MarketStage::Persisted);
    assert_eq!(alpha.fields_processed, 2);

    let bravo = report.get("bravo").unwrap();
    assert!(!bravo.success);
    assert_eq!(bravo.stage, MarketStage::Failed);
    assert!(bravo.first_error().unwrap().contains("network error"));

    // Files exist on disk only for the successful markets
    let files = pipeline.files();
    assert!(files.spec_path("alpha", OutputFormat::Json).exists());
    assert!(files.spec_path("charlie", OutputFormat::Json).exists());
    assert!(!files.spec_path("bravo", OutputFormat::Json).exists());
}

#[tokio::test]
async fn test_report_aggregated_by_market_key() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&[]));
    let pipeline = Pipeline::with_client(test_config(dir.path()), scanner).unwrap();

    let report = pipeline.run(&markets(&["zulu", "alpha", "mike"])).await;

    let keys: Vec<&String> = report.results().keys().collect();
    assert_eq!(keys, vec!["alpha", "mike", "zulu"]);
    assert!(report.all_succeeded());
}

#[tokio::test]
async fn test_second_run_served_from_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&[]));
    let pipeline =
        Pipeline::with_client(test_config(dir.path()), Arc::clone(&scanner) as Arc<dyn ScannerApi>).unwrap();

    let report = pipeline.run(&markets(&["alpha"])).await;
    assert!(report.all_succeeded());
    assert_eq!(scanner.metainfo_calls(), 1);

    let report = pipeline.run(&markets(&["alpha"])).await;
    assert!(report.all_succeeded());
    assert_eq!(
        scanner.metainfo_calls(),
        1,
        "second run should be served from the cache"
    );
}

#[tokio::test]
async fn test_repeated_runs_produce_identical_documents() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&[]));
    let pipeline = Pipeline::with_client(test_config(dir.path()), scanner).unwrap();

    let path = pipeline.files().spec_path("alpha", OutputFormat::Json);

    pipeline.run(&markets(&["alpha"])).await;
    let first = std::fs::read(&path).unwrap();

    pipeline.run(&markets(&["alpha"])).await;
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second, "documents must be byte-identical across runs");
}

#[tokio::test]
async fn test_remote_api_error_recorded_per_market() {
    struct NotFoundScanner;

    #[async_trait]
    impl ScannerApi for NotFoundScanner {
        async fn fetch_metainfo(&self, _market: &str) -> ClientResult<MarketMetadata> {
            Err(ClientError::RemoteApi {
                status: 404,
                message: "unknown market".to_string(),
            })
        }

        async fn fetch_scan(
            &self,
            _market: &str,
            _columns: &[String],
            _limit: usize,
        ) -> ClientResult<Vec<SampleRow>> {
            Ok(Vec::new())
        }
    }

    let dir = tempfile::TempDir::new().unwrap();
    let pipeline =
        Pipeline::with_client(test_config(dir.path()), Arc::new(NotFoundScanner)).unwrap();

    let report = pipeline.run(&markets(&["ghost"])).await;
    let ghost = report.get("ghost").unwrap();
    assert!(!ghost.success);
    assert!(ghost.first_error().unwrap().contains("404"));
}

#[tokio::test]
async fn test_precancelled_run_starts_no_markets() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&[]));
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let pipeline =
        Pipeline::with_client(test_config(dir.path()), Arc::clone(&scanner) as Arc<dyn ScannerApi>)
            .unwrap()
            .with_shutdown(shutdown);

    let report = pipeline.run(&markets(&["alpha", "bravo"])).await;

    assert_eq!(report.failure_count(), 2);
    assert_eq!(scanner.metainfo_calls(), 0, "no market should have started");
    for result in report.results().values() {
        assert!(result.first_error().unwrap().contains("cancelled"));
    }
}

#[tokio::test]
async fn test_cancellation_mid_market_leaves_no_partial_writes() {
    let dir = tempfile::TempDir::new().unwrap();
    let shutdown = ShutdownCoordinator::shared();
    let scanner = Arc::new(MockScanner::with_shutdown_on("solo", shutdown.clone()));

    let pipeline = Pipeline::with_client(test_config(dir.path()), scanner)
        .unwrap()
        .with_shutdown(shutdown);

    let report = pipeline.run(&markets(&["solo"])).await;

    // The fetch stage finished, but no later stage started
    let solo = report.get("solo").unwrap();
    assert!(!solo.success);
    assert!(solo.first_error().unwrap().contains("cancelled"));
    assert!(!pipeline
        .files()
        .spec_path("solo", OutputFormat::Json)
        .exists());
}

#[tokio::test]
async fn test_coverage_gate_blocks_persistence() {
    struct SparseScanner;

    #[async_trait]
    impl ScannerApi for SparseScanner {
        async fn fetch_metainfo(&self, _market: &str) -> ClientResult<MarketMetadata> {
            Ok(MarketMetadata::from_fields(
                (0..5)
                    .map(|i| FieldDefinition::new(format!("f{i}"), FieldKind::Number))
                    .collect(),
            ))
        }

        async fn fetch_scan(
            &self,
            _market: &str,
            columns: &[String],
            _limit: usize,
        ) -> ClientResult<Vec<SampleRow>> {
            // Only the first three columns ever report values: 3/5 = 0.6
            let values: Vec<Value> = columns
                .iter()
                .enumerate()
                .map(|(i, _)| if i < 3 { json!(1.0) } else { Value::Null })
                .collect();
            Ok(vec![SampleRow {
                symbol: "AAA".to_string(),
                values,
            }])
        }
    }

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.require_examples = true;

    let pipeline = Pipeline::with_client(config, Arc::new(SparseScanner)).unwrap();
    let report = pipeline.run(&markets(&["sparse"])).await;

    let sparse = report.get("sparse").unwrap();
    assert!(!sparse.success);
    assert!(sparse.first_error().unwrap().contains("coverage"));
    assert!(!pipeline
        .files()
        .spec_path("sparse", OutputFormat::Json)
        .exists());
}

#[tokio::test]
async fn test_run_summary_metrics() {
    let dir = tempfile::TempDir::new().unwrap();
    let scanner = Arc::new(MockScanner::new(&["bravo"]));
    let pipeline = Pipeline::with_client(test_config(dir.path()), scanner).unwrap();

    pipeline.run(&markets(&["alpha", "bravo"])).await;

    let summary = pipeline.metrics().summary();
    assert_eq!(summary.total_generations, 2);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 1);
    assert!((summary.success_rate - 0.5).abs() < f64::EPSILON);
}
