//! JSON-schema-style validation of tool arguments.
//!
//! Supports the subset the tool catalog uses: `required`, `type`
//! (`string|integer|number|boolean|array|object|null`), string
//! constraints (`minLength`, `maxLength`, `pattern`, `enum`, `format` of
//! `uuid`/`date`), numeric `minimum`/`maximum`, and `items` for arrays.
//! Unknown argument fields are ignored for forward compatibility.

use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Validate `args` against a tool parameter schema. Returns the list of
/// error messages; empty means valid. Deterministic: same input, same
/// error list.
pub fn validate_args(schema: &Value, args: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .cloned()
        .unwrap_or_default();
    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    for name in required.iter().filter_map(|v| v.as_str()) {
        if !args.contains_key(name) {
            errors.push(format!("Missing required parameter: {name}"));
        }
    }

    for (name, value) in args {
        // Unknown parameters are ignored, not rejected.
        let Some(prop_schema) = properties.get(name) else {
            continue;
        };
        validate_value(value, prop_schema, name, &mut errors);
    }

    errors
}

fn validate_value(value: &Value, schema: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(expected) = schema.get("type").and_then(|t| t.as_str()) else {
        return;
    };

    if !type_matches(value, expected) {
        errors.push(format!(
            "{path}: expected {expected}, got {}",
            type_name(value)
        ));
        return;
    }

    match expected {
        "string" => {
            if let Some(s) = value.as_str() {
                validate_string(s, schema, path, errors);
            }
        }
        "integer" | "number" => {
            if let Some(n) = value.as_f64() {
                validate_number(n, schema, path, errors);
            }
        }
        "array" => {
            if let Some(items) = value.as_array() {
                let item_schema = schema.get("items").cloned().unwrap_or(Value::Null);
                for (i, item) in items.iter().enumerate() {
                    validate_value(item, &item_schema, &format!("{path}[{i}]"), errors);
                }
            }
        }
        _ => {}
    }
}

/// JSON type check. Booleans are not integers and vice versa.
fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validate_string(value: &str, schema: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(min) = schema.get("minLength").and_then(|v| v.as_u64()) {
        if (value.chars().count() as u64) < min {
            errors.push(format!("{path}: length must be >= {min}"));
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(|v| v.as_u64()) {
        if (value.chars().count() as u64) > max {
            errors.push(format!("{path}: length must be <= {max}"));
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(|v| v.as_str()) {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(value) {
                    errors.push(format!("{path}: must match pattern {pattern}"));
                }
            }
            Err(_) => {
                errors.push(format!("{path}: schema pattern {pattern} is invalid"));
            }
        }
    }
    if let Some(allowed) = schema.get("enum").and_then(|v| v.as_array()) {
        if !allowed.iter().any(|a| a.as_str() == Some(value)) {
            let options: Vec<&str> = allowed.iter().filter_map(|a| a.as_str()).collect();
            errors.push(format!("{path}: must be one of {options:?}"));
        }
    }
    if let Some(format) = schema.get("format").and_then(|v| v.as_str()) {
        validate_format(value, format, path, errors);
    }
}

fn validate_format(value: &str, format: &str, path: &str, errors: &mut Vec<String>) {
    match format {
        "uuid" => {
            if Uuid::parse_str(value).is_err() {
                errors.push(format!("{path}: must be a valid UUID"));
            }
        }
        "date" => {
            if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                errors.push(format!("{path}: must be a valid date (YYYY-MM-DD)"));
            }
        }
        _ => {}
    }
}

fn validate_number(value: f64, schema: &Value, path: &str, errors: &mut Vec<String>) {
    if let Some(min) = schema.get("minimum").and_then(|v| v.as_f64()) {
        if value < min {
            errors.push(format!("{path}: must be >= {min}"));
        }
    }
    if let Some(max) = schema.get("maximum").and_then(|v| v.as_f64()) {
        if value > max {
            errors.push(format!("{path}: must be <= {max}"));
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
