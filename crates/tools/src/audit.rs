//! Audit logging for tool dispatch and security events.
//!
//! Every tool call (attempt, success, failure) and every sanitization
//! event produces a structured entry emitted through `tracing` under the
//! `audit` target. Sensitive argument fields are redacted and large
//! results truncated before anything reaches the log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Bytes of serialized result kept in a log entry.
const MAX_RESULT_CHARS: usize = 1_000;

/// Argument field names that are always redacted.
const SENSITIVE_FIELDS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "credential",
    "auth",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    ToolCall,
    ToolCallSuccess,
    ToolCallFailure,
    InputSanitized,
}

/// Structured audit log entry. Write-only from the core's perspective.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    pub user_id: String,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Emits audit entries for the tool router.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    fn entry(event: AuditEvent, user_id: Uuid, tool_name: &str) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            event,
            user_id: user_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: None,
            result: None,
            error: None,
            sanitized_fields: None,
            metadata: None,
        }
    }

    /// Log a tool call before execution.
    pub fn tool_call(&self, user_id: Uuid, tool_name: &str, arguments: &Map<String, Value>) {
        let mut entry = Self::entry(AuditEvent::ToolCall, user_id, tool_name);
        entry.arguments = Some(redact_sensitive(arguments));
        emit(&entry, false);
    }

    pub fn tool_success(
        &self,
        user_id: Uuid,
        tool_name: &str,
        arguments: &Map<String, Value>,
        result: &Map<String, Value>,
    ) {
        let mut entry = Self::entry(AuditEvent::ToolCallSuccess, user_id, tool_name);
        entry.arguments = Some(redact_sensitive(arguments));
        entry.result = Some(truncate_result(result));
        emit(&entry, false);
    }

    pub fn tool_failure(
        &self,
        user_id: Uuid,
        tool_name: &str,
        arguments: &Map<String, Value>,
        error: &str,
    ) {
        let mut entry = Self::entry(AuditEvent::ToolCallFailure, user_id, tool_name);
        entry.arguments = Some(redact_sensitive(arguments));
        entry.error = Some(error.to_string());
        emit(&entry, true);
    }

    /// Log that sanitization modified arguments before dispatch.
    pub fn input_sanitized(
        &self,
        user_id: Uuid,
        tool_name: &str,
        sanitized_fields: &[String],
        detected_patterns: &[String],
    ) {
        let mut entry = Self::entry(AuditEvent::InputSanitized, user_id, tool_name);
        entry.sanitized_fields = Some(sanitized_fields.to_vec());
        let mut meta = Map::new();
        meta.insert(
            "detected_patterns".into(),
            Value::Array(
                detected_patterns
                    .iter()
                    .map(|p| Value::String(p.clone()))
                    .collect(),
            ),
        );
        entry.metadata = Some(meta);
        emit(&entry, true);
    }
}

fn emit(entry: &AuditEntry, warn: bool) {
    let json = serde_json::to_string(entry).unwrap_or_default();
    if warn {
        tracing::warn!(target: "audit", user = %entry.user_id, tool = %entry.tool_name, entry = %json, "audit");
    } else {
        tracing::info!(target: "audit", user = %entry.user_id, tool = %entry.tool_name, entry = %json, "audit");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Redaction / truncation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Replace the values of sensitive-looking fields with `[REDACTED]`,
/// recursing into nested objects.
pub fn redact_sensitive(data: &Map<String, Value>) -> Map<String, Value> {
    let mut redacted = Map::new();
    for (key, value) in data {
        let key_lower = key.to_lowercase();
        if SENSITIVE_FIELDS.iter().any(|f| key_lower.contains(f)) {
            redacted.insert(key.clone(), Value::String("[REDACTED]".into()));
        } else if let Value::Object(nested) = value {
            redacted.insert(key.clone(), Value::Object(redact_sensitive(nested)));
        } else {
            redacted.insert(key.clone(), value.clone());
        }
    }
    redacted
}

/// Keep result payloads loggable: anything above the byte budget is
/// replaced by a preview object with a `_truncated` marker.
pub fn truncate_result(result: &Map<String, Value>) -> Value {
    let json = match serde_json::to_string(result) {
        Ok(j) => j,
        Err(_) => return serde_json::json!({"_error": "result not serializable"}),
    };
    if json.len() <= MAX_RESULT_CHARS {
        return Value::Object(result.clone());
    }

    let mut end = MAX_RESULT_CHARS;
    while !json.is_char_boundary(end) {
        end -= 1;
    }
    serde_json::json!({
        "_truncated": true,
        "_original_length": json.len(),
        "preview": format!("{}...", &json[..end]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn redacts_sensitive_field_names() {
        let args = obj(json!({
            "name": "Maui",
            "api_key": "gsk_live_abc",
            "Password": "hunter2",
            "auth_header": "Bearer xyz"
        }));
        let redacted = redact_sensitive(&args);
        assert_eq!(redacted["name"], json!("Maui"));
        assert_eq!(redacted["api_key"], json!("[REDACTED]"));
        assert_eq!(redacted["Password"], json!("[REDACTED]"));
        assert_eq!(redacted["auth_header"], json!("[REDACTED]"));
    }

    #[test]
    fn redacts_nested_objects() {
        let args = obj(json!({"prefs": {"secret_code": "s", "rooms": 2}}));
        let redacted = redact_sensitive(&args);
        assert_eq!(redacted["prefs"]["secret_code"], json!("[REDACTED]"));
        assert_eq!(redacted["prefs"]["rooms"], json!(2));
    }

    #[test]
    fn small_results_pass_untruncated() {
        let result = obj(json!({"count": 0}));
        assert_eq!(truncate_result(&result), json!({"count": 0}));
    }

    #[test]
    fn large_results_get_truncated_marker() {
        let result = obj(json!({"blob": "x".repeat(5_000)}));
        let truncated = truncate_result(&result);
        assert_eq!(truncated["_truncated"], json!(true));
        assert!(truncated["_original_length"].as_u64().unwrap() > 1_000);
        assert!(truncated["preview"].as_str().unwrap().ends_with("..."));
    }
}
