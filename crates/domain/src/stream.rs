use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during LLM streaming (provider-agnostic).
///
/// Tool-call deltas are keyed by `index`; a delta may carry any subset of
/// `{id, name, arguments fragment}` and the consumer merges fragments per
/// index until the stream finishes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A text token chunk.
    #[serde(rename = "token")]
    Token { text: String },

    /// Incremental tool call data at a given index.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },

    /// The client is backing off after a transient rate limit and will
    /// retry; forwarded to the caller, does not end the stream.
    #[serde(rename = "rate_limit")]
    RateLimit {
        attempt: u32,
        max_attempts: u32,
        retry_after: Option<f64>,
    },

    /// Stream is finished.
    #[serde(rename = "done")]
    Done {
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },
}

/// Token usage for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
