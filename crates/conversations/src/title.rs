//! Conversation title generation.
//!
//! After the first full exchange, a short title is derived from the user
//! message and assistant reply through the LLM client. Failures never
//! break the chat flow; callers log and move on.

use fw_domain::error::{Error, Result};
use fw_domain::tool::{ChatMessage, Role};
use fw_providers::{ChatRequest, LlmClient};

use crate::store::{Conversation, StoredMessage};

const MAX_TITLE_CHARS: usize = 80;

/// Titles are generated once: no existing title, and at least one user
/// and one assistant message present.
pub fn should_generate_title(conversation: &Conversation, messages: &[StoredMessage]) -> bool {
    conversation.title.is_none()
        && messages.iter().any(|m| m.role == Role::User)
        && messages.iter().any(|m| m.role == Role::Assistant)
}

/// First user message and first non-empty assistant reply.
pub fn first_exchange(messages: &[StoredMessage]) -> Option<(String, String)> {
    let user = messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())?;
    let assistant = messages
        .iter()
        .find(|m| m.role == Role::Assistant && !m.content.is_empty())
        .map(|m| m.content.clone())?;
    Some((user, assistant))
}

/// Ask the LLM for a short title summarizing the first exchange.
pub async fn generate_title(
    client: &dyn LlmClient,
    user_message: &str,
    assistant_response: &str,
) -> Result<String> {
    let req = ChatRequest {
        messages: vec![
            ChatMessage::system(
                "Generate a short title (at most six words) for this travel \
                 conversation. Reply with the title only, no quotes.",
            ),
            ChatMessage::user(format!(
                "User: {user_message}\nAssistant: {assistant_response}"
            )),
        ],
        tools: Vec::new(),
        temperature: Some(0.3),
        max_tokens: Some(24),
    };

    let response = client.chat(&req).await?;
    let title = clean_title(&response.content);
    if title.is_empty() {
        return Err(Error::Other("title generator returned empty text".into()));
    }
    Ok(title)
}

fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(['"', '\'']).trim();
    let mut title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fw_domain::stream::{BoxStream, StreamEvent};
    use fw_providers::ChatResponse;
    use uuid::Uuid;

    struct CannedClient(String);

    #[async_trait::async_trait]
    impl LlmClient for CannedClient {
        async fn chat(&self, _req: &ChatRequest) -> fw_domain::error::Result<ChatResponse> {
            Ok(ChatResponse {
                content: self.0.clone(),
                tool_calls: Vec::new(),
                finish_reason: Some("stop".into()),
                usage: None,
            })
        }

        async fn chat_stream(
            &self,
            _req: &ChatRequest,
        ) -> fw_domain::error::Result<BoxStream<'static, fw_domain::error::Result<StreamEvent>>>
        {
            unimplemented!("not used by title generation")
        }
    }

    fn message(role: Role, content: &str) -> StoredMessage {
        StoredMessage {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            created_at: Utc::now(),
        }
    }

    fn conversation(title: Option<&str>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.map(String::from),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn title_needed_after_first_exchange() {
        let messages = vec![
            message(Role::User, "track Maui prices"),
            message(Role::Assistant, "Tracking Maui."),
        ];
        assert!(should_generate_title(&conversation(None), &messages));
    }

    #[test]
    fn no_title_when_already_set_or_incomplete() {
        let messages = vec![
            message(Role::User, "hello"),
            message(Role::Assistant, "hi"),
        ];
        assert!(!should_generate_title(
            &conversation(Some("Maui")),
            &messages
        ));
        assert!(!should_generate_title(
            &conversation(None),
            &[message(Role::User, "hello")]
        ));
    }

    #[test]
    fn first_exchange_skips_empty_assistant_turns() {
        let messages = vec![
            message(Role::User, "list my trips"),
            message(Role::Assistant, ""),
            message(Role::Tool, "{}"),
            message(Role::Assistant, "You have no trips."),
        ];
        let (user, assistant) = first_exchange(&messages).unwrap();
        assert_eq!(user, "list my trips");
        assert_eq!(assistant, "You have no trips.");
    }

    #[tokio::test]
    async fn generate_title_cleans_output() {
        let client = CannedClient("  \"Maui Price Watch\"  ".into());
        let title = generate_title(&client, "track maui", "tracking").await.unwrap();
        assert_eq!(title, "Maui Price Watch");
    }

    #[tokio::test]
    async fn generate_title_rejects_empty_output() {
        let client = CannedClient("   ".into());
        assert!(generate_title(&client, "a", "b").await.is_err());
    }
}
