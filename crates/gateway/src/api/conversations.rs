//! Conversation CRUD endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use fw_conversations::{Conversation, StoredMessage};
use fw_domain::tool::Role;

use crate::api::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for MessageResponse {
    fn from(m: StoredMessage) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            tool_calls: m
                .tool_calls
                .and_then(|tc| serde_json::to_value(tc).ok()),
            tool_call_id: m.tool_call_id,
            name: m.name,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "d_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn d_limit() -> usize {
    20
}

/// `GET /v1/chat/conversations` — most recently updated first.
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let conversations: Vec<ConversationResponse> = state
        .conversations
        .list(user_id, params.limit, params.offset)
        .into_iter()
        .map(Into::into)
        .collect();
    Json(conversations)
}

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    #[serde(default = "d_message_limit")]
    pub limit: usize,
}

fn d_message_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

/// `GET /v1/chat/conversations/{thread_id}`.
pub async fn detail(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(thread_id): Path<Uuid>,
    Query(params): Query<DetailParams>,
) -> impl IntoResponse {
    let Some(conversation) = state.conversations.get(thread_id, user_id) else {
        return not_found();
    };
    let messages: Vec<MessageResponse> = state
        .conversations
        .messages(thread_id, Some(params.limit.clamp(1, 500)))
        .into_iter()
        .map(Into::into)
        .collect();

    Json(ConversationDetail {
        conversation: conversation.into(),
        messages,
    })
    .into_response()
}

/// `DELETE /v1/chat/conversations/{thread_id}` — 204 on success,
/// not-found for missing or non-owned conversations alike.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(thread_id): Path<Uuid>,
) -> impl IntoResponse {
    if state.conversations.delete(thread_id, user_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found()
    }
}

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Conversation not found"})),
    )
        .into_response()
}
