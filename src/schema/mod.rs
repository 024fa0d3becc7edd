//! Schema generation
//!
//! Pure transformation from a market's field/filter metadata and scan
//! samples into output schema fragments and the assembled OpenAPI document.
//! The generator never performs I/O and collects its warnings into the
//! result instead of logging, so identical inputs always produce identical
//! outputs.

use serde_json::{Map, Value};

pub mod document;
pub mod generator;

pub use document::build_document;
pub use generator::{GeneratedFields, GeneratorOptions, SchemaGenerator, REQUIRED_COVERAGE};

/// Schema generation errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Example coverage fell below the required threshold
    #[error("example coverage {ratio:.3} below required {required:.3}")]
    Coverage {
        /// Achieved coverage ratio
        ratio: f64,
        /// Required coverage ratio
        required: f64,
    },

    /// Metadata contained no fields to generate from
    #[error("no fields available for market {0}")]
    EmptyMetadata(String),
}

/// Result type for schema generation
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Generated schema description for a single field.
///
/// Fragments are immutable value objects: the generator builds a new
/// fragment per field rather than mutating a shared map.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaFragment {
    /// Field name this fragment describes
    pub name: String,
    /// Output primitive type ("number", "integer", "string", ...)
    pub output_type: &'static str,
    /// Normalized description, if any
    pub description: Option<String>,
    /// Validated (or explicitly bypassed) enum values in original order
    pub enum_values: Option<Vec<Value>>,
    /// Example value, if one could be derived
    pub example: Option<Value>,
}

impl SchemaFragment {
    /// Render the fragment as an output schema object.
    ///
    /// Key order is fixed (`type`, `title`, `description`, `enum`,
    /// `example`) so documents serialize deterministically.
    pub fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String(self.output_type.to_string()));
        schema.insert("title".to_string(), Value::String(self.name.clone()));
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(values) = &self.enum_values {
            schema.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(example) = &self.example {
            schema.insert("example".to_string(), example.clone());
        }
        Value::Object(schema)
    }
}

/// Check whether a JSON value's runtime type matches an output primitive
/// type name.
pub fn value_matches_type(value: &Value, output_type: &str) -> bool {
    match output_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}
