//! Generate command implementation

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::markets::MarketsCommand;
use super::CliError;
use crate::metrics;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::shutdown::SharedShutdown;
use crate::storage::{FileManager, OutputFormat};
use crate::validator::StrictnessPolicy;

/// Maximum allowed concurrency to prevent self-inflicted rate limiting
const MAX_CONCURRENCY: usize = 32;

/// Parse and validate a concurrency value.
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse an output format name.
fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

/// Parse a strictness policy name.
fn parse_strictness(s: &str) -> Result<StrictnessPolicy, String> {
    s.parse()
}

/// Scanner Spec Generator CLI
#[derive(Parser, Debug)]
#[command(name = "scanner-spec-generator")]
#[command(about = "Generate OpenAPI specifications for market scanner endpoints", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory for raw metainfo/scan data
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Root directory for generated spec documents
    #[arg(long, global = true, default_value = "specs")]
    pub specs_dir: PathBuf,

    /// Root directory for the disk cache tier
    #[arg(long, global = true, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Base URL of the scanner service
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Number of markets processed concurrently (default: 4, max: 32)
    ///
    /// All concurrent requests share one rate limiter, so raising this
    /// shortens runs without increasing pressure on the remote service.
    #[arg(long, global = true, default_value = "4", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Maximum number of retries for transient remote failures
    #[arg(long, global = true, default_value = "3", value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Output document format (json or yaml)
    #[arg(long, global = true, default_value = "json", value_parser = parse_output_format)]
    pub format: OutputFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate spec documents for markets
    Generate(GenerateArgs),
    /// List known markets from the data directory
    Markets(MarketsCommand),
}

/// Arguments for the generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Markets to generate (defaults to the markets list on disk)
    pub markets: Vec<String>,

    /// Generate every market from the markets list on disk
    #[arg(long, default_value_t = false)]
    pub all: bool,

    /// Fail a market when fewer than 80% of its fields carry a real example
    #[arg(long, default_value_t = false)]
    pub require_examples: bool,

    /// Pass type-mismatched enums through unchanged instead of dropping them
    #[arg(long, default_value_t = false)]
    pub skip_enum_validation: bool,

    /// Validator strictness: lenient, standard, or strict
    #[arg(long, default_value = "standard", value_parser = parse_strictness)]
    pub strictness: StrictnessPolicy,

    /// Sustained request rate against the remote service
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(1..))]
    pub requests_per_second: u32,

    /// Burst allowance inside the rate limiter's sliding window
    #[arg(long, default_value = "10")]
    pub burst_limit: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl GenerateArgs {
    /// Build the pipeline configuration from CLI arguments.
    fn pipeline_config(&self, cli: &Cli) -> PipelineConfig {
        let mut config = PipelineConfig {
            data_dir: cli.data_dir.clone(),
            specs_dir: cli.specs_dir.clone(),
            cache_dir: cli.cache_dir.clone(),
            max_concurrency: cli.concurrency,
            max_retries: cli.max_retries,
            output_format: cli.format,
            requests_per_second: self.requests_per_second,
            burst_limit: self.burst_limit,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            skip_enum_validation: self.skip_enum_validation,
            require_examples: self.require_examples,
            strictness: self.strictness,
            ..PipelineConfig::default()
        };
        if let Some(base_url) = &cli.base_url {
            config.base_url = base_url.clone();
        }
        config
    }

    /// Resolve the market list: explicit arguments, or the list on disk.
    async fn resolve_markets(&self, cli: &Cli) -> Result<Vec<String>, CliError> {
        if !self.markets.is_empty() {
            if self.all {
                return Err(CliError::InvalidArgument(
                    "pass either explicit markets or --all, not both".to_string(),
                ));
            }
            return Ok(self.markets.clone());
        }

        let files = FileManager::new(&cli.data_dir, &cli.specs_dir)?;
        let markets = files.load_markets().await?;
        if markets.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "no markets given and no markets list found under {}",
                cli.data_dir.display()
            )));
        }
        Ok(markets)
    }

    /// Execute the generate command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            metrics::init_metrics(addr)
                .map_err(|e| CliError::InvalidArgument(format!("metrics setup failed: {e}")))?;
        }

        let markets = self.resolve_markets(cli).await?;
        info!(markets = markets.len(), "Resolved market list");

        let config = self.pipeline_config(cli);
        let pipeline = Pipeline::new(config)?.with_shutdown(shutdown);

        let report = pipeline.run(&markets).await;

        for (market, result) in report.results() {
            if result.success {
                println!(
                    "{market}: {} ({} fields, coverage {:.0}%)",
                    result.stage,
                    result.fields_processed,
                    result.coverage_ratio * 100.0
                );
            } else {
                println!(
                    "{market}: {} ({})",
                    result.stage,
                    result.first_error().unwrap_or("unknown error")
                );
            }
        }
        println!("{}", report.summary_line());

        if report.failure_count() > 0 {
            warn!(failed = report.failure_count(), "Some markets failed");
        }
        if report.success_count() == 0 {
            return Err(CliError::GenerationFailed(report.summary_line()));
        }
        Ok(())
    }
}
