//! Integration tests for schema generation and document assembly

use scanner_spec_generator::schema::{
    build_document, GeneratorOptions, SchemaGenerator,
};
use scanner_spec_generator::storage::OutputFormat;
use scanner_spec_generator::{
    EnumValue, FieldDefinition, FieldKind, MarketMetadata, SampleDocument, SampleRow,
};
use serde_json::json;

/// Metadata and samples from the end-to-end scenario: a numeric close
/// field plus an enumerated status field, with one sampled row.
fn scenario() -> (MarketMetadata, SampleDocument) {
    let metadata = MarketMetadata::from_fields(vec![
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
    ]);

    let samples = SampleDocument {
        columns: vec!["close".to_string(), "status".to_string()],
        rows: vec![SampleRow {
            symbol: "AAA".to_string(),
            values: vec![json!(101.5), json!("BUY")],
        }],
    };

    (metadata, samples)
}

#[test]
fn test_end_to_end_scenario_fragments() {
    let (metadata, samples) = scenario();
    let generator = SchemaGenerator::new(GeneratorOptions::default());

    let generated = generator.generate("crypto", &metadata, &samples).unwrap();
    assert_eq!(generated.fragments.len(), 2);

    let close = &generated.fragments[0];
    assert_eq!(close.name, "close");
    assert_eq!(close.output_type, "number");
    assert_eq!(close.example, Some(json!(101.5)));
    assert_eq!(close.enum_values, None);

    let status = &generated.fragments[1];
    assert_eq!(status.name, "status");
    assert_eq!(status.output_type, "string");
    assert_eq!(status.enum_values, Some(vec![json!("BUY"), json!("SELL")]));
    assert_eq!(status.example, Some(json!("BUY")));

    // Both fields carry evidence-backed examples
    assert!((generated.coverage_ratio - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_end_to_end_scenario_document() {
    let (metadata, samples) = scenario();
    let generator = SchemaGenerator::new(GeneratorOptions::default());
    let generated = generator.generate("crypto", &metadata, &samples).unwrap();

    let document = build_document("crypto", &generated, &metadata, "https://s.example.com");

    let status = &document["components"]["schemas"]["Fields"]["properties"]["status"];
    assert_eq!(status["type"], json!("string"));
    assert_eq!(status["enum"], json!(["BUY", "SELL"]));
    assert_eq!(status["example"], json!("BUY"));

    let close = &document["components"]["schemas"]["Fields"]["properties"]["close"];
    assert_eq!(close["type"], json!("number"));
    assert_eq!(close["example"], json!(101.5));
}

#[test]
fn test_generation_idempotence_byte_identical() {
    let (metadata, samples) = scenario();
    let generator = SchemaGenerator::new(GeneratorOptions::default());

    let render = || {
        let generated = generator.generate("crypto", &metadata, &samples).unwrap();
        let document = build_document("crypto", &generated, &metadata, "https://s.example.com");
        OutputFormat::Json.render(&document).unwrap()
    };

    assert_eq!(render(), render());

    let render_yaml = || {
        let generated = generator.generate("crypto", &metadata, &samples).unwrap();
        let document = build_document("crypto", &generated, &metadata, "https://s.example.com");
        OutputFormat::Yaml.render(&document).unwrap()
    };
    assert_eq!(render_yaml(), render_yaml());
}

#[test]
fn test_unsafe_enum_mode_is_surfaced_in_document() {
    let metadata = MarketMetadata::from_fields(vec![FieldDefinition {
        name: "grade".to_string(),
        kind: FieldKind::Text,
        enum_values: Some(vec![
            EnumValue::Scalar(json!("A")),
            EnumValue::Scalar(json!(1)),
        ]),
        description: None,
        example: None,
    }]);
    let samples = SampleDocument::new(Vec::new());

    // Default mode: the mixed-type enum is dropped
    let generated = SchemaGenerator::new(GeneratorOptions::default())
        .generate("crypto", &metadata, &samples)
        .unwrap();
    assert_eq!(generated.fragments[0].enum_values, None);

    // Unsafe mode: passed through unchanged
    let generated = SchemaGenerator::new(GeneratorOptions {
        skip_enum_validation: true,
        require_examples: false,
    })
    .generate("crypto", &metadata, &samples)
    .unwrap();
    let document = build_document("crypto", &generated, &metadata, "https://s.example.com");
    assert_eq!(
        document["components"]["schemas"]["Fields"]["properties"]["grade"]["enum"],
        json!(["A", 1])
    );
}

#[test]
fn test_field_name_component_tracks_metadata_order() {
    let metadata = MarketMetadata::from_fields(vec![
        FieldDefinition::new("volume", FieldKind::Number),
        FieldDefinition::new("close", FieldKind::Number),
        FieldDefinition::new("open", FieldKind::Number),
    ]);
    let samples = SampleDocument::new(Vec::new());
    let generated = SchemaGenerator::new(GeneratorOptions::default())
        .generate("crypto", &metadata, &samples)
        .unwrap();

    let document = build_document("crypto", &generated, &metadata, "https://s.example.com");
    assert_eq!(
        document["components"]["schemas"]["FieldName"]["enum"],
        json!(["volume", "close", "open"])
    );
}
