//! Field schema generation
//!
//! Maps the loose remote field model onto strict output fragments: a fixed
//! kind-to-type table, enum validation with an explicit bypass mode,
//! example derivation from explicit values, enums, and scan samples, and
//! an example-coverage gate.

use serde_json::{json, Value};

use crate::schema::{value_matches_type, SchemaError, SchemaFragment, SchemaResult};
use crate::{FieldDefinition, FieldKind, MarketMetadata, SampleDocument};

/// Coverage ratio required when `require_examples` is set.
pub const REQUIRED_COVERAGE: f64 = 0.8;

/// Maximum description length before truncation.
pub const MAX_DESCRIPTION_LEN: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Options controlling schema generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    /// Pass type-mismatched enums through unchanged instead of dropping them
    pub skip_enum_validation: bool,
    /// Enforce the example-coverage gate
    pub require_examples: bool,
}

/// Where a fragment's example came from. Placeholder examples do not count
/// toward coverage: the gate measures how much of the schema is backed by
/// real observed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExampleSource {
    Explicit,
    Enum,
    Sampled,
    Placeholder,
}

/// Result of generating all fragments for one market.
#[derive(Debug, Clone)]
pub struct GeneratedFields {
    /// Fragments in metadata declaration order
    pub fragments: Vec<SchemaFragment>,
    /// Warnings accumulated during generation, in encounter order
    pub warnings: Vec<String>,
    /// Fraction of fields carrying an evidence-backed example
    pub coverage_ratio: f64,
}

/// Pure schema generator. Cheap to clone; holds only options.
#[derive(Debug, Clone, Default)]
pub struct SchemaGenerator {
    options: GeneratorOptions,
}

impl SchemaGenerator {
    /// Create a generator with the given options.
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    /// Generate schema fragments for every field of a market.
    ///
    /// # Errors
    /// Returns [`SchemaError::EmptyMetadata`] when the metadata has no
    /// fields, and [`SchemaError::Coverage`] when `require_examples` is set
    /// and fewer than [`REQUIRED_COVERAGE`] of the fields carry an
    /// evidence-backed example. Callers must not persist anything on a
    /// coverage failure.
    pub fn generate(
        &self,
        market: &str,
        metadata: &MarketMetadata,
        samples: &SampleDocument,
    ) -> SchemaResult<GeneratedFields> {
        if metadata.fields.is_empty() {
            return Err(SchemaError::EmptyMetadata(market.to_string()));
        }

        let mut warnings = Vec::new();
        let mut fragments = Vec::with_capacity(metadata.fields.len());
        let mut covered = 0usize;

        for field in &metadata.fields {
            let (fragment, source) = self.build_fragment(field, samples, &mut warnings);
            if source != ExampleSource::Placeholder {
                covered += 1;
            }
            fragments.push(fragment);
        }

        let coverage_ratio = covered as f64 / fragments.len() as f64;

        if self.options.require_examples && coverage_ratio < REQUIRED_COVERAGE {
            return Err(SchemaError::Coverage {
                ratio: coverage_ratio,
                required: REQUIRED_COVERAGE,
            });
        }

        Ok(GeneratedFields {
            fragments,
            warnings,
            coverage_ratio,
        })
    }

    fn build_fragment(
        &self,
        field: &FieldDefinition,
        samples: &SampleDocument,
        warnings: &mut Vec<String>,
    ) -> (SchemaFragment, ExampleSource) {
        let output_type = field.kind.output_type();
        if !field.kind.is_known() {
            warnings.push(format!(
                "field {} has unknown type tag {:?}, defaulting to string",
                field.name, field.kind.to_string()
            ));
        }

        let enum_values = self.resolve_enum(field, output_type, warnings);
        let (example, source) =
            derive_example(field, enum_values.as_deref(), output_type, samples);

        let description = field
            .description
            .as_deref()
            .map(normalize_description)
            .filter(|d| !d.is_empty());

        (
            SchemaFragment {
                name: field.name.clone(),
                output_type,
                description,
                enum_values,
                example,
            },
            source,
        )
    }

    /// Resolve a field's enum values against the mapped output type.
    ///
    /// Empty or null-only enums are treated as absent. On a type mismatch
    /// the enum is dropped (default) or passed through unchanged when
    /// validation is explicitly bypassed.
    fn resolve_enum(
        &self,
        field: &FieldDefinition,
        output_type: &str,
        warnings: &mut Vec<String>,
    ) -> Option<Vec<Value>> {
        let raw = field.enum_values.as_ref()?;

        let values: Vec<Value> = raw
            .iter()
            .map(|v| v.value().clone())
            .filter(|v| !v.is_null())
            .collect();
        if values.is_empty() {
            warnings.push(format!(
                "field {} has an empty or malformed enum, treating as absent",
                field.name
            ));
            return None;
        }

        let mismatch = values.iter().find(|v| !value_matches_type(v, output_type));
        match mismatch {
            None => Some(values),
            Some(bad) if self.options.skip_enum_validation => {
                warnings.push(format!(
                    "field {}: bypassing validation for enum value {bad} (expected {output_type})",
                    field.name
                ));
                Some(values)
            }
            Some(bad) => {
                warnings.push(format!(
                    "field {}: dropping enum, value {bad} does not match type {output_type}",
                    field.name
                ));
                None
            }
        }
    }
}

/// Derive an example for a field.
///
/// Preference order: explicit type-valid example, first type-valid enum
/// value, first type-valid sampled value, type placeholder.
fn derive_example(
    field: &FieldDefinition,
    enum_values: Option<&[Value]>,
    output_type: &str,
    samples: &SampleDocument,
) -> (Option<Value>, ExampleSource) {
    if let Some(example) = &field.example {
        if value_matches_type(example, output_type) {
            return (Some(example.clone()), ExampleSource::Explicit);
        }
    }

    if let Some(first) = enum_values.and_then(|values| values.first()) {
        if value_matches_type(first, output_type) {
            return (Some(first.clone()), ExampleSource::Enum);
        }
    }

    if let Some(sampled) = samples.first_value_for(&field.name) {
        if value_matches_type(sampled, output_type) {
            return (Some(sampled.clone()), ExampleSource::Sampled);
        }
    }

    (
        Some(placeholder_example(&field.kind)),
        ExampleSource::Placeholder,
    )
}

/// Type-appropriate placeholder example for a field kind.
pub fn placeholder_example(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Number | FieldKind::Price | FieldKind::Percent => json!(123.45),
        FieldKind::Integer => json!(123),
        FieldKind::Boolean => json!(true),
        FieldKind::Time => json!("2023-01-01T00:00:00Z"),
        FieldKind::Set => json!(["item1", "item2"]),
        FieldKind::Map => json!({"key": "value"}),
        FieldKind::Text | FieldKind::Other(_) => json!("example_value"),
    }
}

/// Collapse internal whitespace to single spaces and truncate beyond
/// [`MAX_DESCRIPTION_LEN`] characters with a marker.
pub fn normalize_description(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_DESCRIPTION_LEN {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(MAX_DESCRIPTION_LEN).collect();
    truncated + TRUNCATION_MARKER
}
