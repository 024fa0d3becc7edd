//! Per-market generation results and the run-level report

use serde::Serialize;
use std::collections::BTreeMap;

/// Stage a market's pipeline pass is in, or finished at.
///
/// Stages advance `Pending → Fetching → Generating → Validating →
/// Persisted`; a failure at any stage transitions directly to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketStage {
    /// Not yet started
    Pending,
    /// Loading metainfo/scan data from cache or the remote
    Fetching,
    /// Building schema fragments
    Generating,
    /// Structural and coverage checks
    Validating,
    /// Spec document written to disk
    Persisted,
    /// Aborted; see the recorded errors
    Failed,
}

impl std::fmt::Display for MarketStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketStage::Pending => "pending",
            MarketStage::Fetching => "fetching",
            MarketStage::Generating => "generating",
            MarketStage::Validating => "validating",
            MarketStage::Persisted => "persisted",
            MarketStage::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one market's pipeline pass. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Market identifier
    pub market: String,
    /// Final stage (`Persisted` or `Failed`)
    pub stage: MarketStage,
    /// Whether the spec document was generated and persisted
    pub success: bool,
    /// Fields processed
    pub fields_processed: usize,
    /// Fraction of fields with an evidence-backed example
    pub coverage_ratio: f64,
    /// Errors, in encounter order
    pub errors: Vec<String>,
    /// Warnings, in encounter order
    pub warnings: Vec<String>,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
    /// Resident-set delta in bytes, if measurable
    pub memory_delta_bytes: Option<i64>,
}

impl GenerationResult {
    /// The first recorded error, if any.
    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}

/// Run-level aggregation of per-market outcomes.
///
/// Results are keyed by market, not completion order, so concurrent
/// markets may finish in any order without affecting the report.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    results: BTreeMap<String, GenerationResult>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one market's result.
    pub fn insert(&mut self, result: GenerationResult) {
        self.results.insert(result.market.clone(), result);
    }

    /// Result for one market, if recorded.
    pub fn get(&self, market: &str) -> Option<&GenerationResult> {
        self.results.get(market)
    }

    /// All results, keyed by market.
    pub fn results(&self) -> &BTreeMap<String, GenerationResult> {
        &self.results
    }

    /// Number of successfully persisted markets.
    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }

    /// Number of failed markets.
    pub fn failure_count(&self) -> usize {
        self.results.values().filter(|r| !r.success).count()
    }

    /// Whether every recorded market succeeded (false for an empty run).
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.failure_count() == 0
    }

    /// First error per failed market, in market order.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.results
            .values()
            .filter(|r| !r.success)
            .filter_map(|r| {
                r.first_error()
                    .map(|e| (r.market.clone(), e.to_string()))
            })
            .collect()
    }

    /// One-line human-readable summary.
    pub fn summary_line(&self) -> String {
        format!(
            "Generated {} specs, {} failed",
            self.success_count(),
            self.failure_count()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(market: &str, success: bool) -> GenerationResult {
        GenerationResult {
            market: market.to_string(),
            stage: if success {
                MarketStage::Persisted
            } else {
                MarketStage::Failed
            },
            success,
            fields_processed: 5,
            coverage_ratio: 1.0,
            errors: if success {
                Vec::new()
            } else {
                vec!["network error: boom".to_string(), "second".to_string()]
            },
            warnings: Vec::new(),
            duration_secs: 0.1,
            memory_delta_bytes: None,
        }
    }

    #[test]
    fn test_report_counts_and_errors() {
        let mut report = RunReport::new();
        report.insert(result("crypto", true));
        report.insert(result("forex", false));
        report.insert(result("bonds", true));

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.all_succeeded());

        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "forex");
        assert_eq!(errors[0].1, "network error: boom");

        assert_eq!(report.summary_line(), "Generated 2 specs, 1 failed");
    }

    #[test]
    fn test_report_keyed_by_market_not_completion_order() {
        let mut report = RunReport::new();
        report.insert(result("zebra", true));
        report.insert(result("alpha", true));

        let markets: Vec<&String> = report.results().keys().collect();
        assert_eq!(markets, vec!["alpha", "zebra"]);
    }

    #[test]
    fn test_empty_report_is_not_a_success() {
        let report = RunReport::new();
        assert!(!report.all_succeeded());
        assert_eq!(report.success_count(), 0);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(MarketStage::Pending.to_string(), "pending");
        assert_eq!(MarketStage::Persisted.to_string(), "persisted");
        assert_eq!(MarketStage::Failed.to_string(), "failed");
    }
}
