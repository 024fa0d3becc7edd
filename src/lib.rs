//! # Scanner Spec Generator Library
//!
//! A library for discovering the schema of a market-data scanner API and
//! generating machine-readable OpenAPI specifications per market segment.
//! Designed for API exploration, client generation, and documentation of
//! scanner endpoints whose request/response shapes are only partially
//! documented upstream.
//!
//! ## Features
//!
//! - **Schema Discovery**: Fetches per-market metainfo and sample scan data
//!   from the remote scanner service
//! - **Rate Limiting**: Sliding-window rate limiter with burst allowance to
//!   respect remote API limits
//! - **Multi-Level Caching**: Memory, disk, and API-response cache tiers
//!   with independent TTLs
//! - **Deterministic Output**: Identical inputs always produce byte-identical
//!   specification documents
//! - **Failure Isolation**: A single market's failure never aborts the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use scanner_spec_generator::pipeline::{Pipeline, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(config)?;
//!
//! let report = pipeline
//!     .run(&["crypto".to_string(), "forex".to_string()])
//!     .await;
//!
//! println!("{} generated, {} failed", report.success_count(), report.failure_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`client`] - Remote scanner API client with rate limiting and retry
//! - [`cache`] - Multi-level cache (memory, disk, API-response tiers)
//! - [`storage`] - Durable load/save of metainfo, scan samples, and specs
//! - [`schema`] - Pure schema generation from field/filter metadata
//! - [`validator`] - Structural validation with configurable strictness
//! - [`pipeline`] - Per-market orchestration with bounded concurrency
//! - [`metrics`] - Generation metrics collection and export
//!
//! ## Data Types
//!
//! The library defines strongly-typed structures for the field model:
//!
//! - [`FieldDefinition`] - A named, typed column the scanner can report
//! - [`FieldKind`] - Closed enumeration of remote field type tags
//! - [`MarketMetadata`] - Ordered field/filter metadata for one market
//! - [`SampleRow`] - One sampled ticker row used for example derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Multi-level caching (memory, disk, API-response tiers)
pub mod cache;

/// CLI command implementations
pub mod cli;

/// Remote scanner API client with rate limiting and retry
pub mod client;

/// Generation metrics collection and export
pub mod metrics;

/// Per-market orchestration pipeline
pub mod pipeline;

/// Schema generation from field/filter metadata
pub mod schema;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Durable file storage for metainfo, scan samples, and spec documents
pub mod storage;

/// Structural validation with configurable strictness
pub mod validator;

// Re-export commonly used types
pub use pipeline::{Pipeline, PipelineConfig};

/// Field type tag as reported by the scanner metainfo endpoint.
///
/// The remote service uses a loose string tag; this is the closed set of
/// tags it is known to emit. Unknown tags are preserved in [`FieldKind::Other`]
/// and mapped to a string output type with a warning rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Floating-point numeric value
    Number,
    /// Price value (numeric)
    Price,
    /// Percentage value (numeric)
    Percent,
    /// Integer value
    Integer,
    /// Free text
    Text,
    /// Boolean flag
    Boolean,
    /// Timestamp (serialized as an ISO 8601 string)
    Time,
    /// Set of values (serialized as an array)
    Set,
    /// Key/value structure (serialized as an object)
    Map,
    /// Unrecognized type tag, preserved verbatim
    Other(String),
}

impl FieldKind {
    /// Map the field kind to its output schema primitive type.
    ///
    /// Unknown tags fall back to `"string"`; callers emit a warning for
    /// those rather than failing the field.
    pub fn output_type(&self) -> &'static str {
        match self {
            FieldKind::Number | FieldKind::Price | FieldKind::Percent => "number",
            FieldKind::Integer => "integer",
            FieldKind::Text => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Time => "string",
            FieldKind::Set => "array",
            FieldKind::Map => "object",
            FieldKind::Other(_) => "string",
        }
    }

    /// Whether this kind is one of the known scanner type tags.
    pub fn is_known(&self) -> bool {
        !matches!(self, FieldKind::Other(_))
    }
}

impl From<String> for FieldKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "number" => FieldKind::Number,
            "price" => FieldKind::Price,
            "percent" => FieldKind::Percent,
            "integer" => FieldKind::Integer,
            // The remote emits both tags for textual columns
            "text" | "string" => FieldKind::Text,
            "boolean" => FieldKind::Boolean,
            "time" => FieldKind::Time,
            "set" => FieldKind::Set,
            "map" => FieldKind::Map,
            _ => FieldKind::Other(tag),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.to_string()
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldKind::Number => "number",
            FieldKind::Price => "price",
            FieldKind::Percent => "percent",
            FieldKind::Integer => "integer",
            FieldKind::Text => "text",
            FieldKind::Boolean => "boolean",
            FieldKind::Time => "time",
            FieldKind::Set => "set",
            FieldKind::Map => "map",
            FieldKind::Other(tag) => tag,
        };
        write!(f, "{s}")
    }
}

impl FromStr for FieldKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldKind::from(s.to_string()))
    }
}

/// One permitted value of an enumerated field.
///
/// The metainfo endpoint encodes enum values either as raw scalars or as
/// labeled references (`{"id": ..., "name": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    /// Labeled reference with an identifier and optional display name
    Labeled {
        /// Underlying value
        id: Value,
        /// Optional human-readable label
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Raw scalar value
    Scalar(Value),
}

impl EnumValue {
    /// The underlying value, regardless of encoding.
    pub fn value(&self) -> &Value {
        match self {
            EnumValue::Labeled { id, .. } => id,
            EnumValue::Scalar(value) => value,
        }
    }
}

/// A named, typed data column the scanner can report for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name, unique within a market
    pub name: String,
    /// Remote type tag
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Permitted values, if the field is enumerated
    #[serde(rename = "enumValues", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<EnumValue>>,
    /// Free-text description from the remote, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit example value from the remote, if any
    #[serde(rename = "exampleValue", default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl FieldDefinition {
    /// Create a field with just a name and kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enum_values: None,
            description: None,
            example: None,
        }
    }

    /// Validate field data integrity.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("Field name cannot be empty".to_string());
        }

        if let Some(values) = &self.enum_values {
            if values.is_empty() {
                return Err(format!("Field {} has an empty enumValues list", self.name));
            }
        }

        Ok(())
    }
}

/// A filter-capability descriptor from the metainfo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    /// Filter name
    pub name: String,
    /// Remote type tag
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the filter must be supplied in scan requests
    #[serde(default)]
    pub required: bool,
}

/// Ordered field and filter metadata for one market.
///
/// Decoded from the remote metainfo response and immutable for the duration
/// of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMetadata {
    /// Field definitions in remote declaration order
    pub fields: Vec<FieldDefinition>,
    /// Filter-capability descriptors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterDefinition>,
}

impl MarketMetadata {
    /// Create metadata from a list of fields with no filters.
    pub fn from_fields(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            filters: Vec::new(),
        }
    }

    /// Validate metadata integrity.
    pub fn validate(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err("Metadata contains no fields".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(format!("Duplicate field name: {}", field.name));
            }
        }

        Ok(())
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// One sampled ticker row from the scan endpoint.
///
/// `values` is positional and aligned to the `columns` projection the scan
/// request carried. Sample rows are only used to derive illustrative
/// examples and coverage statistics, never persisted as authoritative
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    /// Ticker symbol (e.g., "BINANCE:BTCUSDT")
    pub symbol: String,
    /// Sampled values, positionally aligned to the request columns
    pub values: Vec<Value>,
}

impl SampleRow {
    /// Validate sample row integrity against its column projection.
    pub fn validate(&self, columns: &[String]) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("Sample row symbol cannot be empty".to_string());
        }

        if self.values.len() != columns.len() {
            return Err(format!(
                "Sample row for {} has {} values but {} columns were requested",
                self.symbol,
                self.values.len(),
                columns.len()
            ));
        }

        Ok(())
    }
}

/// Persisted scan sample document: a column projection plus sampled rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDocument {
    /// Column projection the rows are aligned to
    pub columns: Vec<String>,
    /// Sampled rows
    pub rows: Vec<SampleRow>,
}

impl SampleDocument {
    /// Create an empty sample document for the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Look up the first sampled value for a column, skipping nulls.
    pub fn first_value_for(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .filter_map(|row| row.values.get(index))
            .find(|v| !v.is_null())
    }
}
