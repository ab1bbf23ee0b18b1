//! Deterministic token estimation for context-window budgeting.
//!
//! Not a real tokenizer: a fixed bytes/4 estimate, consistent across
//! calls, which is all the context-window selection needs. Message and
//! tool counts add the per-message formatting overhead used by
//! OpenAI-style chat wire formats.

use fw_domain::tool::{ChatMessage, ToolDefinition};

/// Base overhead per message (role + separators).
const MESSAGE_OVERHEAD: usize = 4;
/// Priming overhead added once per batch.
const PRIMING_OVERHEAD: usize = 3;

pub struct TokenEstimator;

impl TokenEstimator {
    /// Approximate token count for a text string. Empty text counts zero.
    pub fn count(text: &str) -> usize {
        text.len().div_ceil(4)
    }

    /// Token estimate for one message including formatting overhead.
    pub fn count_message(msg: &ChatMessage) -> usize {
        let mut total = MESSAGE_OVERHEAD + Self::count(&msg.content);
        if let Some(name) = &msg.name {
            total += Self::count(name) + 1;
        }
        if let Some(tool_calls) = &msg.tool_calls {
            for tc in tool_calls {
                total += Self::count(&tc.function.name);
                total += Self::count(&tc.function.arguments);
            }
        }
        total
    }

    /// Token estimate for a message batch, including the priming overhead.
    pub fn count_messages(messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .map(Self::count_message)
            .sum::<usize>()
            + PRIMING_OVERHEAD
    }

    /// Token estimate for the serialized tool schemas; they share the
    /// context window with the conversation.
    pub fn count_tools(tools: &[ToolDefinition]) -> usize {
        tools
            .iter()
            .map(|tool| {
                let wire = serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                });
                Self::count(&wire.to_string())
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_domain::tool::ToolCall;

    #[test]
    fn empty_text_counts_zero() {
        assert_eq!(TokenEstimator::count(""), 0);
    }

    #[test]
    fn count_rounds_up() {
        assert_eq!(TokenEstimator::count("abcd"), 1);
        assert_eq!(TokenEstimator::count("abcde"), 2);
        assert_eq!(TokenEstimator::count(&"x".repeat(100)), 25);
    }

    #[test]
    fn count_is_additive_within_one_per_message() {
        let a = "pack my bags";
        let b = "for maui";
        let separate = TokenEstimator::count(a) + TokenEstimator::count(b);
        let joined = TokenEstimator::count(&format!("{a}{b}"));
        assert!(separate.abs_diff(joined) <= 1);
    }

    #[test]
    fn message_overhead_applied() {
        let msg = ChatMessage::user("abcd");
        // 4 overhead + 1 content token.
        assert_eq!(TokenEstimator::count_message(&msg), 5);
    }

    #[test]
    fn named_tool_message_counts_name() {
        let msg = ChatMessage::tool_result("call_1", "list_trips", "abcd");
        let bare = ChatMessage::user("abcd");
        let expected = TokenEstimator::count_message(&bare)
            + TokenEstimator::count("list_trips")
            + 1;
        assert_eq!(TokenEstimator::count_message(&msg), expected);
    }

    #[test]
    fn tool_calls_contribute_tokens() {
        let plain = ChatMessage::assistant("");
        let with_calls = ChatMessage::assistant_with_tools(
            "",
            vec![ToolCall::new("c1", "list_trips", r#"{"status":"active"}"#)],
        );
        assert!(
            TokenEstimator::count_message(&with_calls) > TokenEstimator::count_message(&plain)
        );
    }

    #[test]
    fn batch_adds_priming_once() {
        let msgs = vec![ChatMessage::user("abcd"), ChatMessage::assistant("efgh")];
        let per_message: usize = msgs.iter().map(TokenEstimator::count_message).sum();
        assert_eq!(TokenEstimator::count_messages(&msgs), per_message + 3);
    }

    #[test]
    fn tool_schemas_count_serialized_size() {
        let tools = vec![ToolDefinition {
            name: "list_trips".into(),
            description: "List all trips".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        assert!(TokenEstimator::count_tools(&tools) > 0);
        assert_eq!(TokenEstimator::count_tools(&[]), 0);
    }
}
