//! OpenAPI document assembly
//!
//! Builds the complete per-market specification document from generated
//! field fragments: component schemas, request/response envelopes, and the
//! scan/metainfo path items. All maps are built in fixed insertion order so
//! the rendered document is deterministic.

use serde_json::{json, Map, Value};

use crate::schema::GeneratedFields;
use crate::MarketMetadata;

/// OpenAPI version emitted in generated documents.
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Version stamp for generated documents.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Build the full OpenAPI document for one market.
pub fn build_document(
    market: &str,
    generated: &GeneratedFields,
    metadata: &MarketMetadata,
    server_url: &str,
) -> Value {
    let title = display_name(market);
    let fields_schema = build_fields_schema(generated);
    let filters_schema = build_filters_schema(metadata);
    let request_body_schema = build_request_body_schema(&fields_schema, &filters_schema);
    let field_name_schema = build_field_name_schema(generated);
    let scan_request = build_scan_request_schema(market);
    let scan_response = build_scan_response_schema();
    let scan_result = build_scan_result_schema();
    let error_response = build_error_schema();

    json!({
        "openapi": OPENAPI_VERSION,
        "info": {
            "title": format!("{title} Market API"),
            "description": info_description(market, metadata),
            "version": DOCUMENT_VERSION,
        },
        "servers": [
            {
                "url": server_url,
                "description": "Market scanner API",
            }
        ],
        "paths": {
            (format!("/{market}/scan")): {
                "post": {
                    "tags": [format!("{title} Market")],
                    "summary": format!("Scan {title} market data"),
                    "description": format!(
                        "Retrieve {title} market data with filtering and field selection."
                    ),
                    "operationId": format!("scan_{market}"),
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/ScanRequest"},
                            }
                        },
                    },
                    "responses": {
                        "200": {
                            "description": "Scan results",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ScanResponse"},
                                }
                            },
                        },
                        "400": {
                            "description": "Malformed request",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"},
                                }
                            },
                        },
                        "404": {
                            "description": "Market not found",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"},
                                }
                            },
                        },
                        "500": {
                            "description": "Internal server error",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/ErrorResponse"},
                                }
                            },
                        },
                    },
                }
            },
            (format!("/{market}/metainfo")): {
                "get": {
                    "tags": [format!("{title} Market")],
                    "summary": format!("Get {title} market metadata"),
                    "description": "Field and filter metadata for this market.",
                    "operationId": format!("get_{market}_metainfo"),
                    "responses": {
                        "200": {
                            "description": "Market metadata",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Fields"},
                                }
                            },
                        },
                    },
                }
            },
        },
        "components": {
            "schemas": {
                "Fields": fields_schema,
                "Filters": filters_schema,
                "RequestBody": request_body_schema,
                "FieldName": field_name_schema,
                "ScanRequest": scan_request,
                "ScanResponse": scan_response,
                "ScanResult": scan_result,
                "ErrorResponse": error_response,
            }
        },
        "tags": [
            {
                "name": format!("{title} Market"),
                "description": format!("Operations for the {title} market"),
            }
        ],
    })
}

/// Human-readable market name: `_`-separated parts title-cased.
pub fn display_name(market: &str) -> String {
    market
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn info_description(market: &str, metadata: &MarketMetadata) -> String {
    let title = display_name(market);
    let mut lines = Vec::new();
    lines.push(format!(
        "### Purpose\nAccess to {title} market data through the scanner API."
    ));
    lines.push("\n### Supported Operations".to_string());
    lines.push("- Scan the market with filters and field selection".to_string());
    lines.push("- Sort and paginate by any reported field".to_string());
    lines.push("- Read field and filter metadata".to_string());
    lines.push("\n### Notes".to_string());
    lines.push(format!(
        "- {} fields and {} filters discovered for this market",
        metadata.fields.len(),
        metadata.filters.len()
    ));
    lines.push("- Time values use ISO 8601, UTC".to_string());
    lines.push(format!(
        "- Request and response shapes are typed per OpenAPI {OPENAPI_VERSION}"
    ));
    lines.join("\n")
}

/// The `Fields` component schema: one property per generated fragment, in
/// declaration order.
pub fn build_fields_schema(generated: &GeneratedFields) -> Value {
    let mut properties = Map::new();
    for fragment in &generated.fragments {
        properties.insert(fragment.name.clone(), fragment.to_schema());
    }

    json!({
        "type": "object",
        "title": "Fields",
        "description": "Market fields",
        "properties": properties,
    })
}

/// The `Filters` component schema.
pub fn build_filters_schema(metadata: &MarketMetadata) -> Value {
    if metadata.filters.is_empty() {
        return json!({
            "type": "object",
            "title": "Filters",
            "description": "No filters available for this market",
            "properties": {},
        });
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for filter in &metadata.filters {
        properties.insert(
            filter.name.clone(),
            json!({
                "type": filter.kind.output_type(),
                "title": filter.name,
                "description": format!("Filter: {}", filter.name),
            }),
        );
        if filter.required {
            required.push(Value::String(filter.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("title".to_string(), json!("Filters"));
    schema.insert("description".to_string(), json!("Market filters"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

/// Combined request-body schema: field properties plus filter properties.
pub fn build_request_body_schema(fields_schema: &Value, filters_schema: &Value) -> Value {
    let mut properties = Map::new();
    for source in [fields_schema, filters_schema] {
        if let Some(map) = source.get("properties").and_then(|p| p.as_object()) {
            for (name, schema) in map {
                properties.insert(name.clone(), schema.clone());
            }
        }
    }

    let mut required = Vec::new();
    for source in [fields_schema, filters_schema] {
        if let Some(list) = source.get("required").and_then(|r| r.as_array()) {
            required.extend(list.iter().cloned());
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("title".to_string(), json!("Request Body"));
    schema.insert(
        "description".to_string(),
        json!("Request body combining fields and filters"),
    );
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

/// Enum schema of every discovered field name, usable as the `columns`
/// item type in scan requests.
pub fn build_field_name_schema(generated: &GeneratedFields) -> Value {
    let names: Vec<Value> = generated
        .fragments
        .iter()
        .map(|f| Value::String(f.name.clone()))
        .collect();
    let example = names.first().cloned().unwrap_or(Value::Null);

    json!({
        "type": "string",
        "enum": names,
        "description": "Field permitted for this market",
        "example": example,
    })
}

fn build_scan_request_schema(market: &str) -> Value {
    json!({
        "type": "object",
        "description": "Scan request with tickers, columns, and optional filters",
        "required": ["symbols", "columns"],
        "properties": {
            "symbols": {
                "type": "object",
                "required": ["tickers"],
                "properties": {
                    "tickers": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "pattern": "^[A-Z0-9:._-]+$",
                            "description": "Ticker in EXCHANGE:SYMBOL form",
                        },
                        "description": "Tickers to scan",
                        "minItems": 1,
                        "maxItems": 25,
                    }
                },
            },
            "columns": {
                "type": "array",
                "description": "Fields to report, in response order",
                "items": {"$ref": "#/components/schemas/FieldName"},
                "minItems": 1,
            },
            "filter": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["left", "operation", "right"],
                    "properties": {
                        "left": {"type": "string", "description": "Field to filter on"},
                        "operation": {
                            "type": "string",
                            "enum": [">", "<", ">=", "<=", "=", "!="],
                            "description": "Comparison operator",
                        },
                        "right": {"type": "number", "description": "Comparison value"},
                    },
                },
                "description": "Filter conditions",
            },
            "sort": {
                "type": "object",
                "properties": {
                    "sortBy": {"type": "string", "description": "Field to sort by"},
                    "sortOrder": {
                        "type": "string",
                        "enum": ["asc", "desc"],
                        "description": "Sort direction",
                    },
                },
                "description": "Sort parameters",
            },
            "range": {
                "type": "array",
                "items": {"type": "integer"},
                "minItems": 2,
                "maxItems": 2,
                "description": "Pagination window: [start, count]",
            },
            "markets": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Market segment selector",
                "example": [market],
            },
        },
    })
}

fn build_scan_response_schema() -> Value {
    json!({
        "type": "object",
        "required": ["totalCount", "data"],
        "properties": {
            "totalCount": {
                "type": "integer",
                "description": "Total number of matching tickers",
            },
            "data": {
                "type": "array",
                "description": "Per-ticker results",
                "items": {"$ref": "#/components/schemas/ScanResult"},
            },
        },
    })
}

fn build_scan_result_schema() -> Value {
    json!({
        "type": "object",
        "required": ["s", "d"],
        "properties": {
            "s": {"type": "string", "description": "Ticker symbol"},
            "d": {
                "type": "array",
                "description": "Values in the same order as the requested columns",
                "items": {},
            },
        },
    })
}

fn build_error_schema() -> Value {
    json!({
        "type": "object",
        "required": ["error", "code"],
        "properties": {
            "error": {"type": "string", "description": "Error message"},
            "code": {"type": "integer", "description": "Error code"},
        },
    })
}
