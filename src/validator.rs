//! Structural validation
//!
//! One validator type parameterized by a strictness policy value. Standard
//! performs type/shape checks, Strict additionally requires titles and
//! descriptions, Lenient accepts any well-formed value.

use serde_json::Value;
use tracing::warn;

use crate::schema::value_matches_type;
use crate::FieldDefinition;

/// How demanding validation should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictnessPolicy {
    /// Accept any well-formed value
    Lenient,
    /// Type and shape checks (default)
    #[default]
    Standard,
    /// Standard checks plus required title/description
    Strict,
}

impl std::str::FromStr for StrictnessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(StrictnessPolicy::Lenient),
            "standard" | "default" => Ok(StrictnessPolicy::Standard),
            "strict" => Ok(StrictnessPolicy::Strict),
            other => Err(format!("unknown strictness policy: {other}")),
        }
    }
}

/// Output schema type names accepted in generated fragments.
const VALID_SCHEMA_TYPES: &[&str] = &[
    "object", "array", "string", "number", "integer", "boolean", "null",
];

/// Structural validator for field definitions and generated schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: StrictnessPolicy,
}

impl Validator {
    /// Create a validator with the given policy.
    pub fn new(policy: StrictnessPolicy) -> Self {
        Self { policy }
    }

    /// The active strictness policy.
    pub fn policy(&self) -> StrictnessPolicy {
        self.policy
    }

    /// Validate a field definition.
    pub fn validate_field(&self, field: &FieldDefinition) -> bool {
        if field.name.is_empty() {
            warn!("Field has an empty name");
            return false;
        }

        if self.policy == StrictnessPolicy::Lenient {
            return true;
        }

        if !field.kind.is_known() {
            warn!(field = %field.name, kind = %field.kind, "Field has unknown type tag");
            return false;
        }

        if let Some(values) = &field.enum_values {
            if values.is_empty() {
                warn!(field = %field.name, "Field enum cannot be empty");
                return false;
            }
        }

        if self.policy == StrictnessPolicy::Strict && field.description.is_none() {
            warn!(field = %field.name, "Field missing description (strict)");
            return false;
        }

        true
    }

    /// Validate a generated schema object.
    ///
    /// Standard checks: a known `type` is present; `enum`, if present, is a
    /// non-empty array; `properties` of an object schema is a non-empty map;
    /// `items` of an array schema is a map.
    pub fn validate_schema(&self, schema: &Value) -> bool {
        let object = match schema.as_object() {
            Some(object) => object,
            None => {
                warn!("Schema is not an object");
                return false;
            }
        };

        if self.policy == StrictnessPolicy::Lenient {
            return true;
        }

        let schema_type = match object.get("type").and_then(|t| t.as_str()) {
            Some(schema_type) => schema_type,
            None => {
                warn!("Schema missing 'type'");
                return false;
            }
        };

        if !VALID_SCHEMA_TYPES.contains(&schema_type) {
            warn!(schema_type, "Schema has invalid type");
            return false;
        }

        if let Some(enum_values) = object.get("enum") {
            match enum_values.as_array() {
                Some(values) if !values.is_empty() => {}
                _ => {
                    warn!("Schema enum must be a non-empty array");
                    return false;
                }
            }
        }

        if schema_type == "object" {
            if let Some(properties) = object.get("properties") {
                match properties.as_object() {
                    Some(map) if !map.is_empty() => {}
                    _ => {
                        warn!("Object schema properties must be a non-empty map");
                        return false;
                    }
                }
            }
        }

        if schema_type == "array" {
            if let Some(items) = object.get("items") {
                if !items.is_object() {
                    warn!("Array schema items must be a map");
                    return false;
                }
            }
        }

        if self.policy == StrictnessPolicy::Strict {
            if !object.contains_key("description") {
                warn!("Schema missing description (strict)");
                return false;
            }
            if !object.contains_key("title") {
                warn!("Schema missing title (strict)");
                return false;
            }
        }

        true
    }

    /// Validate an example value against an output type name.
    pub fn validate_example(&self, example: &Value, output_type: &str) -> bool {
        if self.policy == StrictnessPolicy::Lenient {
            return true;
        }
        value_matches_type(example, output_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnumValue, FieldKind};
    use serde_json::json;

    fn field(name: &str, kind: FieldKind) -> FieldDefinition {
        FieldDefinition::new(name, kind)
    }

    #[test]
    fn test_policy_parsing() {
        use std::str::FromStr;
        assert_eq!(
            StrictnessPolicy::from_str("lenient").unwrap(),
            StrictnessPolicy::Lenient
        );
        assert_eq!(
            StrictnessPolicy::from_str("default").unwrap(),
            StrictnessPolicy::Standard
        );
        assert_eq!(
            StrictnessPolicy::from_str("STRICT").unwrap(),
            StrictnessPolicy::Strict
        );
        assert!(StrictnessPolicy::from_str("paranoid").is_err());
    }

    #[test]
    fn test_standard_field_validation() {
        let validator = Validator::default();
        assert!(validator.validate_field(&field("close", FieldKind::Number)));
        assert!(!validator.validate_field(&field("", FieldKind::Number)));
        assert!(!validator.validate_field(&field("x", FieldKind::Other("weird".to_string()))));

        let mut empty_enum = field("status", FieldKind::Text);
        empty_enum.enum_values = Some(Vec::new());
        assert!(!validator.validate_field(&empty_enum));
    }

    #[test]
    fn test_strict_field_requires_description() {
        let validator = Validator::new(StrictnessPolicy::Strict);
        let mut f = field("close", FieldKind::Number);
        assert!(!validator.validate_field(&f));

        f.description = Some("Closing price".to_string());
        assert!(validator.validate_field(&f));
    }

    #[test]
    fn test_lenient_field_accepts_almost_anything() {
        let validator = Validator::new(StrictnessPolicy::Lenient);
        assert!(validator.validate_field(&field("x", FieldKind::Other("weird".to_string()))));

        let mut empty_enum = field("status", FieldKind::Text);
        empty_enum.enum_values = Some(Vec::new());
        assert!(validator.validate_field(&empty_enum));

        // Name is still required
        assert!(!validator.validate_field(&field("", FieldKind::Number)));
    }

    #[test]
    fn test_standard_schema_validation() {
        let validator = Validator::default();

        assert!(validator.validate_schema(&json!({"type": "number"})));
        assert!(validator.validate_schema(&json!({
            "type": "object",
            "properties": {"close": {"type": "number"}},
        })));

        assert!(!validator.validate_schema(&json!("not an object")));
        assert!(!validator.validate_schema(&json!({"description": "typeless"})));
        assert!(!validator.validate_schema(&json!({"type": "price"})));
        assert!(!validator.validate_schema(&json!({"type": "string", "enum": []})));
        assert!(!validator.validate_schema(&json!({"type": "string", "enum": "BUY"})));
        assert!(!validator.validate_schema(&json!({"type": "object", "properties": {}})));
        assert!(!validator.validate_schema(&json!({"type": "array", "items": "string"})));
    }

    #[test]
    fn test_strict_schema_requires_title_and_description() {
        let validator = Validator::new(StrictnessPolicy::Strict);

        assert!(!validator.validate_schema(&json!({"type": "number"})));
        assert!(validator.validate_schema(&json!({
            "type": "number",
            "title": "Close",
            "description": "Closing price",
        })));
    }

    #[test]
    fn test_lenient_schema_accepts_any_map() {
        let validator = Validator::new(StrictnessPolicy::Lenient);
        assert!(validator.validate_schema(&json!({"anything": "goes"})));
        assert!(!validator.validate_schema(&json!(42)));
    }

    #[test]
    fn test_example_validation() {
        let validator = Validator::default();
        assert!(validator.validate_example(&json!(101.5), "number"));
        assert!(!validator.validate_example(&json!("BUY"), "number"));

        let lenient = Validator::new(StrictnessPolicy::Lenient);
        assert!(lenient.validate_example(&json!("BUY"), "number"));
    }

    #[test]
    fn test_generated_fragments_pass_standard_validation() {
        use crate::schema::{GeneratorOptions, SchemaGenerator};
        use crate::{MarketMetadata, SampleDocument};

        let metadata = MarketMetadata::from_fields(vec![
            field("close", FieldKind::Number),
            FieldDefinition {
                name: "status".to_string(),
                kind: FieldKind::Text,
                enum_values: Some(vec![
                    EnumValue::Scalar(json!("BUY")),
                    EnumValue::Scalar(json!("SELL")),
                ]),
                description: Some("Signal status".to_string()),
                example: None,
            },
        ]);

        let generated = SchemaGenerator::new(GeneratorOptions::default())
            .generate("crypto", &metadata, &SampleDocument::new(Vec::new()))
            .unwrap();

        let validator = Validator::default();
        for fragment in &generated.fragments {
            assert!(validator.validate_schema(&fragment.to_schema()));
        }
    }
}
