//! SSE chunk wire format for the streaming chat endpoints.
//!
//! Each chunk serializes as a flat JSON object with a `type` tag and the
//! optional payload field for that kind, e.g.
//! `{"type":"tool_call","tool_call":{"id":…,"name":…,"arguments":…}}`.
//! `thread_id` rides on the first chunk of a stream and on `done`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatChunkKind {
    Content,
    ToolCall,
    ToolResult,
    Elicitation,
    Error,
    RateLimit,
    Done,
}

/// A tool call being made by the LLM. `arguments` is the raw JSON string
/// exactly as the model produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallChunk {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultChunk {
    pub tool_call_id: String,
    pub name: String,
    pub result: Value,
    pub success: bool,
}

/// A tool-signaled pause asking the caller to collect structured input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationChunk {
    pub tool_call_id: String,
    pub tool_name: String,
    pub component: String,
    pub prefilled: Value,
    pub missing_fields: Vec<String>,
}

/// Progress of the LLM client's rate-limit backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub attempt: u32,
    pub max_attempts: u32,
    pub retry_after: Option<f64>,
}

/// Individual chunk in the SSE stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(rename = "type")]
    pub kind: ChatChunkKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_status: Option<RateLimitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
}

impl ChatChunk {
    fn of_kind(kind: ChatChunkKind) -> Self {
        Self {
            kind,
            content: None,
            tool_call: None,
            tool_result: None,
            elicitation: None,
            error: None,
            rate_limit_status: None,
            thread_id: None,
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::of_kind(ChatChunkKind::Content)
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            tool_call: Some(ToolCallChunk {
                id: id.into(),
                name: name.into(),
                arguments: arguments.into(),
            }),
            ..Self::of_kind(ChatChunkKind::ToolCall)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result: Value,
        success: bool,
    ) -> Self {
        Self {
            tool_result: Some(ToolResultChunk {
                tool_call_id: tool_call_id.into(),
                name: name.into(),
                result,
                success,
            }),
            ..Self::of_kind(ChatChunkKind::ToolResult)
        }
    }

    pub fn elicitation(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        component: impl Into<String>,
        prefilled: Value,
        missing_fields: Vec<String>,
    ) -> Self {
        Self {
            elicitation: Some(ElicitationChunk {
                tool_call_id: tool_call_id.into(),
                tool_name: tool_name.into(),
                component: component.into(),
                prefilled,
                missing_fields,
            }),
            ..Self::of_kind(ChatChunkKind::Elicitation)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::of_kind(ChatChunkKind::Error)
        }
    }

    pub fn rate_limit(attempt: u32, max_attempts: u32, retry_after: Option<f64>) -> Self {
        Self {
            rate_limit_status: Some(RateLimitStatus {
                attempt,
                max_attempts,
                retry_after,
            }),
            ..Self::of_kind(ChatChunkKind::RateLimit)
        }
    }

    pub fn done(thread_id: Option<Uuid>) -> Self {
        Self {
            thread_id,
            ..Self::of_kind(ChatChunkKind::Done)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_chunk_wire_format() {
        let chunk = ChatChunk::content("hello");
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v, json!({"type": "content", "content": "hello"}));
    }

    #[test]
    fn tool_call_chunk_wire_format() {
        let chunk = ChatChunk::tool_call("call_1", "list_trips", "{}");
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "tool_call",
                "tool_call": {"id": "call_1", "name": "list_trips", "arguments": "{}"}
            })
        );
    }

    #[test]
    fn rate_limit_chunk_wire_format() {
        let chunk = ChatChunk::rate_limit(1, 3, Some(2.5));
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "rate_limit",
                "rate_limit_status": {"attempt": 1, "max_attempts": 3, "retry_after": 2.5}
            })
        );
    }

    #[test]
    fn done_chunk_carries_thread_id() {
        let id = Uuid::new_v4();
        let chunk = ChatChunk::done(Some(id));
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v, json!({"type": "done", "thread_id": id.to_string()}));
    }

    #[test]
    fn done_chunk_without_thread_id_omits_field() {
        let v = serde_json::to_value(ChatChunk::done(None)).unwrap();
        assert_eq!(v, json!({"type": "done"}));
    }

    #[test]
    fn elicitation_chunk_wire_format() {
        let chunk = ChatChunk::elicitation(
            "call_2",
            "create_trip",
            "create-trip-form",
            json!({"name": "Hawaii"}),
            vec!["origin_airport".into(), "depart_date".into()],
        );
        let v = serde_json::to_value(&chunk).unwrap();
        assert_eq!(v["type"], "elicitation");
        assert_eq!(v["elicitation"]["component"], "create-trip-form");
        assert_eq!(v["elicitation"]["missing_fields"][1], "depart_date");
    }
}
