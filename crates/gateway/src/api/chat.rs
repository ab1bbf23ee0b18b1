//! Streaming chat endpoints.
//!
//! - `POST /v1/chat/messages` — one utterance in, SSE chunk stream out
//! - `POST /v1/chat/elicitation/{tool_call_id}` — submit form data for a
//!   pending elicitation, SSE `tool_result` + `done` out
//!
//! Each SSE event is `data: <ChatChunk JSON>\n\n`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use fw_domain::chunk::ChatChunk;

use crate::api::{sse_headers, CurrentUser};
use crate::runtime::{run_chat, run_elicitation, ChatInput, ElicitationInput};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    /// The user's message (1..=10000 chars, enforced by the runtime).
    pub message: String,
    /// Existing conversation id; a new conversation is created when
    /// absent.
    #[serde(default)]
    pub thread_id: Option<Uuid>,
}

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<ChatRequestBody>,
) -> impl IntoResponse {
    let rx = run_chat(
        state,
        ChatInput {
            user_id,
            utterance: body.message,
            thread_id: body.thread_id,
        },
    );

    (
        sse_headers(),
        Sse::new(chunk_stream(rx)).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ElicitationBody {
    pub thread_id: Uuid,
    pub tool_name: String,
    /// The completed form data, passed to the tool as its arguments.
    pub data: Map<String, Value>,
}

pub async fn submit_elicitation(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(tool_call_id): Path<String>,
    Json(body): Json<ElicitationBody>,
) -> impl IntoResponse {
    // Not-found on a foreign conversation: existence is never revealed.
    if state
        .conversations
        .get(body.thread_id, user_id)
        .is_none()
    {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Conversation not found"})),
        )
            .into_response();
    }
    if !state.router.is_registered(&body.tool_name) {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Tool not registered: {}", body.tool_name)
            })),
        )
            .into_response();
    }

    let rx = run_elicitation(
        state,
        ElicitationInput {
            user_id,
            thread_id: body.thread_id,
            tool_call_id,
            tool_name: body.tool_name,
            data: body.data,
        },
    );

    (
        sse_headers(),
        Sse::new(chunk_stream(rx)).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

fn chunk_stream(
    mut rx: mpsc::Receiver<ChatChunk>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
    }
}
