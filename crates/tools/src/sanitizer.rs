//! Input sanitization for LLM-generated tool arguments.
//!
//! Runs before schema validation so validation always sees clean input.
//! String leaves are scrubbed against a fixed table of injection patterns
//! (SQL, NoSQL, shell, path traversal); matched substrings are stripped
//! and the result trimmed. Non-string primitives pass through untouched.
//! The dotted path of every modified leaf is recorded for the audit log.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pattern tables
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct Pattern {
    regex: Regex,
    tag: &'static str,
}

fn p(pattern: &str, tag: &'static str) -> Pattern {
    Pattern {
        // The table is static; a malformed entry is a programming error
        // caught by the pattern-table test below.
        regex: Regex::new(pattern).unwrap_or_else(|e| panic!("bad sanitizer pattern {tag}: {e}")),
        tag,
    }
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    vec![
        // SQL injection
        p(
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE)\b",
            "sql_keyword",
        ),
        p(r"(?i)\bUNION\s+(ALL\s+)?SELECT\b", "sql_union"),
        p(r"(?s)(--|#|/\*.*?\*/)", "sql_comment"),
        p(r#"(?i)\bOR\s+['"]?1['"]?\s*=\s*['"]?1['"]?"#, "sql_or_true"),
        p(r#"(?i)\bAND\s+['"]?1['"]?\s*=\s*['"]?1['"]?"#, "sql_and_true"),
        p(r"(?i)'\s*(OR|AND|UNION|SELECT)\b", "sql_quote_escape"),
        p(r"0x[0-9a-fA-F]+", "sql_hex"),
        p(r"(?i)\b(EXEC|EXECUTE)\s*\(", "sql_exec"),
        p(r"(?i);\s*(SELECT|INSERT|UPDATE|DELETE|DROP)\b", "sql_chain"),
        // NoSQL operators (MongoDB-style)
        p(r"(?i)\$where\b", "nosql_where"),
        p(
            r"(?i)\$(gt|gte|lt|lte|ne|eq|in|nin|regex|exists)\b",
            "nosql_operator",
        ),
        p(r"(?i)\$(or|and|not|nor)\b", "nosql_logic"),
        p(r"(?i)\bfunction\s*\(", "nosql_function"),
        p(r"(?i)\beval\s*\(", "nosql_eval"),
        // Command injection
        p(r"[|;&`$]", "cmd_metachar"),
        p(r"\$\([^)]+\)", "cmd_subst"),
        p(r"`[^`]+`", "cmd_backtick"),
        p(
            r"(?i)\b(rm|chmod|chown|sudo|su|wget|curl|nc|netcat)\b",
            "cmd_dangerous",
        ),
        p(r"[<>]{1,2}", "cmd_redirect"),
        // Path traversal
        p(r"\.\.(/|\\)", "path_traversal"),
        p(r"(?i)^/etc/", "path_etc"),
        p(r"(?i)^/proc/", "path_proc"),
        p(r"(?i)^/sys/", "path_sys"),
        p(r"(?i)^/root/", "path_root"),
        p(r"(?i)^[A-Za-z]:\\Windows\\", "path_windows"),
    ]
});

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sanitizer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of input sanitization.
#[derive(Debug, Clone)]
pub struct SanitizationResult {
    pub data: Map<String, Value>,
    pub was_modified: bool,
    /// Dotted paths of every modified string leaf (`prefs.notes`, `codes[2]`).
    pub sanitized_fields: Vec<String>,
    /// Tags of the patterns that fired, in detection order.
    pub detected_patterns: Vec<String>,
}

/// Sanitize a tool-argument object.
pub fn sanitize(data: &Map<String, Value>) -> SanitizationResult {
    let mut sanitized_fields = Vec::new();
    let mut detected_patterns = Vec::new();
    let data = sanitize_map(data, "", &mut sanitized_fields, &mut detected_patterns);

    SanitizationResult {
        data,
        was_modified: !sanitized_fields.is_empty(),
        sanitized_fields,
        detected_patterns,
    }
}

/// Scrub a single string. Returns the cleaned value and the tags of the
/// patterns that matched. Patterns apply in table order against the
/// progressively cleaned text.
pub fn sanitize_string(value: &str) -> (String, Vec<&'static str>) {
    let mut detected = Vec::new();
    let mut sanitized = value.to_string();

    for pattern in PATTERNS.iter() {
        if pattern.regex.is_match(&sanitized) {
            detected.push(pattern.tag);
            sanitized = pattern.regex.replace_all(&sanitized, "").into_owned();
        }
    }

    (sanitized.trim().to_string(), detected)
}

fn sanitize_map(
    data: &Map<String, Value>,
    path: &str,
    sanitized_fields: &mut Vec<String>,
    detected_patterns: &mut Vec<String>,
) -> Map<String, Value> {
    let mut result = Map::new();
    for (key, value) in data {
        let field_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        result.insert(
            key.clone(),
            sanitize_value(value, &field_path, sanitized_fields, detected_patterns),
        );
    }
    result
}

fn sanitize_value(
    value: &Value,
    path: &str,
    sanitized_fields: &mut Vec<String>,
    detected_patterns: &mut Vec<String>,
) -> Value {
    match value {
        Value::String(s) => {
            let (clean, tags) = sanitize_string(s);
            if !tags.is_empty() {
                tracing::warn!(field = path, patterns = ?tags, "sanitized tool argument");
                sanitized_fields.push(path.to_string());
                detected_patterns.extend(tags.iter().map(|t| t.to_string()));
            }
            Value::String(clean)
        }
        Value::Object(map) => Value::Object(sanitize_map(
            map,
            path,
            sanitized_fields,
            detected_patterns,
        )),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    sanitize_value(
                        item,
                        &format!("{path}[{i}]"),
                        sanitized_fields,
                        detected_patterns,
                    )
                })
                .collect(),
        ),
        // Numbers, booleans, and null are safe as-is.
        other => other.clone(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object literal")
    }

    #[test]
    fn pattern_table_compiles() {
        assert!(!PATTERNS.is_empty());
    }

    #[test]
    fn clean_input_passes_unmodified() {
        let args = obj(json!({"name": "Maui spring break", "adults": 2}));
        let result = sanitize(&args);
        assert!(!result.was_modified);
        assert_eq!(result.data, args);
        assert!(result.sanitized_fields.is_empty());
    }

    #[test]
    fn strips_sql_keywords() {
        let args = obj(json!({"name": "DROP TABLE trips"}));
        let result = sanitize(&args);
        assert!(result.was_modified);
        assert_eq!(result.sanitized_fields, vec!["name"]);
        assert!(result.detected_patterns.contains(&"sql_keyword".to_string()));
        let clean = result.data["name"].as_str().unwrap();
        assert!(!clean.to_uppercase().contains("DROP"));
    }

    #[test]
    fn strips_sql_comment_and_chain() {
        let args = obj(json!({"q": "x'; DROP TABLE users; --"}));
        let result = sanitize(&args);
        assert!(result.was_modified);
        assert!(result
            .detected_patterns
            .iter()
            .any(|t| t == "sql_comment" || t == "sql_chain"));
    }

    #[test]
    fn strips_nosql_operators() {
        let args = obj(json!({"filter": "$where: function() { return 1 }"}));
        let result = sanitize(&args);
        assert!(result.detected_patterns.contains(&"nosql_where".to_string()));
        assert!(result
            .detected_patterns
            .contains(&"nosql_function".to_string()));
    }

    #[test]
    fn strips_command_metacharacters() {
        let args = obj(json!({"note": "nice | rm -rf / && echo done"}));
        let result = sanitize(&args);
        let clean = result.data["note"].as_str().unwrap();
        assert!(!clean.contains('|'));
        assert!(!clean.contains("rm"));
        assert!(result.detected_patterns.contains(&"cmd_metachar".to_string()));
    }

    #[test]
    fn strips_path_traversal() {
        let args = obj(json!({"file": "../../etc/passwd", "abs": "/etc/shadow"}));
        let result = sanitize(&args);
        assert!(result
            .detected_patterns
            .contains(&"path_traversal".to_string()));
        assert!(result.detected_patterns.contains(&"path_etc".to_string()));
    }

    #[test]
    fn nested_maps_and_arrays_get_dotted_paths() {
        let args = obj(json!({
            "prefs": {"notes": "SELECT secret"},
            "codes": ["LAX", "`whoami`"]
        }));
        let result = sanitize(&args);
        assert!(result.sanitized_fields.contains(&"prefs.notes".to_string()));
        assert!(result.sanitized_fields.contains(&"codes[1]".to_string()));
        // Untouched siblings survive verbatim.
        assert_eq!(result.data["codes"][0], json!("LAX"));
    }

    #[test]
    fn non_string_primitives_pass_through() {
        let args = obj(json!({"adults": 2, "round_trip": true, "budget": 1500.5, "note": null}));
        let result = sanitize(&args);
        assert!(!result.was_modified);
        assert_eq!(result.data, args);
    }

    #[test]
    fn sanitization_is_idempotent() {
        let payloads = [
            json!({"name": "trip'; DROP TABLE trips; --"}),
            json!({"q": "1 OR 1=1"}),
            json!({"cmd": "$(cat /etc/passwd) > out"}),
            json!({"f": "../../../root/.ssh/id_rsa"}),
            json!({"nested": {"deep": ["$gt: 1", "eval(x)"]}}),
        ];
        for payload in payloads {
            let once = sanitize(&obj(payload));
            let twice = sanitize(&once.data);
            assert!(!twice.was_modified, "second pass modified {:?}", once.data);
            assert_eq!(once.data, twice.data);
        }
    }

    #[test]
    fn sanitize_trims_whitespace_left_behind() {
        let (clean, tags) = sanitize_string("  DROP  ");
        assert_eq!(clean, "");
        assert_eq!(tags, vec!["sql_keyword"]);
    }
}
