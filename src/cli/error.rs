//! CLI error types and conversions

use crate::pipeline::PipelineError;
use crate::storage::StorageError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Pipeline error
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The run produced no specs at all
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}
