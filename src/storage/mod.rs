//! Durable file storage
//!
//! Load/save of per-market metainfo, scan samples, the markets list, and
//! generated specification documents. Spec documents are written atomically
//! (temp file + rename) under an advisory lock so concurrent runs cannot
//! interleave partial writes.

use fd_lock::RwLock;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{MarketMetadata, SampleDocument};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Output serialization format for generated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    /// Serialize a document to a string in this format.
    ///
    /// Serialization is deterministic: identical documents produce
    /// byte-identical strings.
    pub fn render(&self, document: &Value) -> StorageResult<String> {
        match self {
            OutputFormat::Json => serde_json::to_string_pretty(document)
                .map(|s| s + "\n")
                .map_err(|e| StorageError::Serialization(e.to_string())),
            OutputFormat::Yaml => serde_yaml::to_string(document)
                .map_err(|e| StorageError::Serialization(e.to_string())),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// File manager for raw market data and generated spec documents.
pub struct FileManager {
    data_dir: PathBuf,
    specs_dir: PathBuf,
    metainfo_dir: PathBuf,
    scan_dir: PathBuf,
}

impl FileManager {
    /// Create a file manager rooted at the given directories.
    ///
    /// Directories are created eagerly; failure here is a configuration
    /// error and fatal to the run.
    pub fn new(data_dir: impl Into<PathBuf>, specs_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        let specs_dir = specs_dir.into();
        let metainfo_dir = data_dir.join("metainfo");
        let scan_dir = data_dir.join("scan");

        for dir in [&data_dir, &specs_dir, &metainfo_dir, &scan_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::Io(format!("failed to create directory {}: {e}", dir.display()))
            })?;
        }

        Ok(Self {
            data_dir,
            specs_dir,
            metainfo_dir,
            scan_dir,
        })
    }

    /// Path of the generated spec document for a market.
    pub fn spec_path(&self, market: &str, format: OutputFormat) -> PathBuf {
        self.specs_dir.join(format!(
            "{}_openapi.{}",
            sanitize_market(market),
            format.extension()
        ))
    }

    /// Save market metainfo to `data/metainfo/{market}.json`.
    pub async fn save_metainfo(
        &self,
        market: &str,
        metadata: &MarketMetadata,
    ) -> StorageResult<()> {
        let path = self.metainfo_dir.join(format!("{}.json", sanitize_market(market)));
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StorageError::Io(format!("failed to write {}: {e}", path.display())))?;
        debug!(market, path = %path.display(), "Saved metainfo");
        Ok(())
    }

    /// Load market metainfo, if present on disk.
    pub async fn load_metainfo(&self, market: &str) -> StorageResult<Option<MarketMetadata>> {
        let path = self.metainfo_dir.join(format!("{}.json", sanitize_market(market)));
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let metadata = serde_json::from_str(&contents)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(Some(metadata))
    }

    /// Save a scan sample document to `data/scan/{market}.json`.
    pub async fn save_scan(&self, market: &str, samples: &SampleDocument) -> StorageResult<()> {
        let path = self.scan_dir.join(format!("{}.json", sanitize_market(market)));
        let json = serde_json::to_string_pretty(samples)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StorageError::Io(format!("failed to write {}: {e}", path.display())))?;
        debug!(market, path = %path.display(), "Saved scan sample");
        Ok(())
    }

    /// Load a scan sample document, if present on disk.
    pub async fn load_scan(&self, market: &str) -> StorageResult<Option<SampleDocument>> {
        let path = self.scan_dir.join(format!("{}.json", sanitize_market(market)));
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        let samples = serde_json::from_str(&contents)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;
        Ok(Some(samples))
    }

    /// Load the market list from `data/markets.json`.
    ///
    /// Accepts either a bare array or the grouped
    /// `{"countries": [...], "other": [...]}` encoding. A missing file is an
    /// empty list, not an error.
    pub async fn load_markets(&self) -> StorageResult<Vec<String>> {
        let path = self.data_dir.join("markets.json");
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Markets file not found");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| StorageError::Deserialization(e.to_string()))?;

        let markets = match value {
            Value::Array(_) => serde_json::from_value(value)
                .map_err(|e| StorageError::Deserialization(e.to_string()))?,
            Value::Object(ref map) => {
                let mut markets: Vec<String> = Vec::new();
                for group in ["countries", "other"] {
                    if let Some(Value::Array(items)) = map.get(group) {
                        markets.extend(
                            items.iter().filter_map(|v| v.as_str().map(String::from)),
                        );
                    }
                }
                markets
            }
            _ => Vec::new(),
        };

        Ok(markets)
    }

    /// Save the market list to `data/markets.json`.
    pub async fn save_markets(&self, markets: &[String]) -> StorageResult<()> {
        let path = self.data_dir.join("markets.json");
        let json = serde_json::to_string_pretty(markets)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| StorageError::Io(format!("failed to write {}: {e}", path.display())))?;
        info!(count = markets.len(), "Saved markets list");
        Ok(())
    }

    /// Save a generated spec document atomically.
    ///
    /// Writes under an advisory lock to a temp file in the specs directory,
    /// syncs, then renames over the target so readers never observe a
    /// partial document.
    pub async fn save_spec(
        &self,
        market: &str,
        document: &Value,
        format: OutputFormat,
    ) -> StorageResult<PathBuf> {
        let path = self.spec_path(market, format);
        let rendered = format.render(document)?;
        write_atomic(&path, rendered.as_bytes())?;

        info!(market, path = %path.display(), "Saved spec document");
        Ok(path)
    }

    /// Data directory root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Specs directory root.
    pub fn specs_dir(&self) -> &Path {
        &self.specs_dir
    }
}

/// Atomically replace `path` with `contents`.
fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    // Lock file coordinates concurrent writers of the same document
    let lock_path = path.with_extension("lock");
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| StorageError::Lock(format!("failed to create lock file: {e}")))?;
    let mut lock = RwLock::new(lock_file);
    let _guard = lock
        .write()
        .map_err(|e| StorageError::Lock(format!("failed to acquire write lock: {e}")))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| StorageError::Io(format!("failed to create temp file: {e}")))?;
    temp_file
        .write_all(contents)
        .map_err(|e| StorageError::Io(format!("failed to write temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| StorageError::Io(format!("failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| StorageError::Io(format!("failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| StorageError::Io(format!("failed to persist temp file: {e}")))?;

    Ok(())
}

/// Sanitize a market identifier for filesystem safety.
///
/// Prevents path traversal: `..` becomes `__`, separators become `_`.
fn sanitize_market(market: &str) -> String {
    market.replace("..", "__").replace(['/', '\\', ':'], "_")
}
