//! Per-market orchestration
//!
//! The pipeline drives each market through fetch, generate, validate, and
//! persist stages with bounded concurrency across markets. Every
//! market-scoped error is caught at the pipeline boundary and recorded in
//! that market's result; a single market's failure never aborts the run.
//!
//! # Components
//!
//! - [`runner::Pipeline`] - The orchestrator
//! - [`config::PipelineConfig`] - Run configuration surface
//! - [`report::RunReport`] - Aggregated per-market outcomes

pub mod config;
pub mod report;
pub mod runner;

pub use config::PipelineConfig;
pub use report::{GenerationResult, MarketStage, RunReport};
pub use runner::Pipeline;

use crate::cache::CacheError;
use crate::client::ClientError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Remote client failure (network, remote API, security, parse)
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Schema generation failure (coverage gate, empty metadata)
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// File system failure on persist/load
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cache maintenance failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Generated schema failed structural validation
    #[error("validation error: {0}")]
    Validation(String),

    /// Invalid run configuration (run-fatal, not market-scoped)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The run was cancelled before this market could finish
    #[error("cancelled: {0}")]
    Cancelled(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
