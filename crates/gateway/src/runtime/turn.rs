//! Turn execution — the orchestrator that turns one user utterance into
//! a stream of [`ChatChunk`]s.
//!
//! Entry point [`run_chat`] spawns the async loop and returns a channel
//! of chunks for SSE streaming. One turn: scope check → conversation
//! resolution (with the per-user cap) → persist user message → context
//! window → LLM/tool rounds → finalization (assistant + tool messages in
//! one block, title, prune) → `done`.
//!
//! Every await is a cancellation point: the caller dropping the receiver
//! makes the next chunk send fail, which aborts the turn without running
//! finalization — only the already-committed user message survives.

use std::collections::{BTreeMap, HashMap};

use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use fw_conversations::store::to_chat_messages;
use fw_conversations::{title, NewMessage};
use fw_domain::chunk::ChatChunk;
use fw_domain::error::Error;
use fw_domain::stream::StreamEvent;
use fw_domain::tool::{ChatMessage, ToolCall, ToolDefinition};
use fw_providers::ChatRequest;
use fw_tools::catalog;

use super::{prompts, scope};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One user utterance.
pub struct ChatInput {
    pub user_id: Uuid,
    pub utterance: String,
    pub thread_id: Option<Uuid>,
}

/// A submitted elicitation form.
pub struct ElicitationInput {
    pub user_id: Uuid,
    pub thread_id: Uuid,
    pub tool_call_id: String,
    pub tool_name: String,
    pub data: Map<String, Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chunk emission
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sends chunks to the caller; stamps the first chunk with the thread
/// id. A failed send means the SSE client disconnected, which callers
/// treat as cancellation.
struct ChunkSender {
    tx: mpsc::Sender<ChatChunk>,
    thread_id: Option<Uuid>,
    first_sent: bool,
}

impl ChunkSender {
    fn new(tx: mpsc::Sender<ChatChunk>) -> Self {
        Self {
            tx,
            thread_id: None,
            first_sent: false,
        }
    }

    async fn send(&mut self, mut chunk: ChatChunk) -> bool {
        if !self.first_sent {
            self.first_sent = true;
            if chunk.thread_id.is_none() {
                chunk.thread_id = self.thread_id;
            }
        }
        if self.tx.send(chunk).await.is_err() {
            tracing::debug!("chat client went away, treating turn as cancelled");
            return false;
        }
        true
    }

    async fn done(&mut self, thread_id: Option<Uuid>) {
        let _ = self.send(ChatChunk::done(thread_id)).await;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_chat — the outer turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one chat turn. Returns a channel receiver; the last chunk on a
/// non-cancelled stream is always `done`.
pub fn run_chat(state: AppState, input: ChatInput) -> mpsc::Receiver<ChatChunk> {
    let (tx, rx) = mpsc::channel::<ChatChunk>(64);
    tokio::spawn(async move {
        let mut emitter = ChunkSender::new(tx);
        run_chat_inner(state, input, &mut emitter).await;
    });
    rx
}

async fn run_chat_inner(state: AppState, input: ChatInput, emitter: &mut ChunkSender) {
    let chat_cfg = state.config.chat.clone();

    // ── Utterance bounds and scope, before any persistence ─────────
    let length = input.utterance.chars().count();
    if input.utterance.trim().is_empty() {
        let _ = emitter.send(ChatChunk::error("Message cannot be empty.")).await;
        emitter.done(input.thread_id).await;
        return;
    }
    if length > chat_cfg.max_utterance_chars {
        let _ = emitter
            .send(ChatChunk::error(format!(
                "Message is too long ({length} characters; the limit is {}).",
                chat_cfg.max_utterance_chars
            )))
            .await;
        emitter.done(input.thread_id).await;
        return;
    }

    let validation = scope::validate_query(&input.utterance);
    if !validation.is_valid {
        tracing::warn!(
            reason = validation.reason.as_deref().unwrap_or(""),
            confidence = %validation.confidence,
            "query rejected as out of scope"
        );
        let _ = emitter.send(ChatChunk::content(prompts::SCOPE_REDIRECT)).await;
        emitter.done(input.thread_id).await;
        return;
    }

    // ── Conversation resolution ────────────────────────────────────
    if input.thread_id.is_none() {
        state
            .conversations
            .enforce_limit(input.user_id, chat_cfg.max_conversations_per_user);
    }
    let conversation = state
        .conversations
        .get_or_create(input.thread_id, input.user_id);
    emitter.thread_id = Some(conversation.id);
    tracing::info!(
        user = %input.user_id,
        conversation = %conversation.id,
        "chat turn started"
    );

    // The user message commits on its own; everything else in this turn
    // lands in the finalization block (or not at all).
    if state
        .conversations
        .append(conversation.id, NewMessage::user(&input.utterance))
        .is_err()
    {
        let _ = emitter
            .send(ChatChunk::error("Chat processing error. Please try again."))
            .await;
        emitter.done(Some(conversation.id)).await;
        return;
    }

    // ── Prompt and context window ──────────────────────────────────
    let system_prompt =
        prompts::build_system_prompt(input.user_id, &state.trips.list(input.user_id, None));
    let history = state
        .conversations
        .messages_for_context(conversation.id, Some(&system_prompt));
    let mut messages = vec![ChatMessage::system(&system_prompt)];
    messages.extend(to_chat_messages(&history));

    // ── Tool-call loop ─────────────────────────────────────────────
    let mut turn = TurnAccumulator::default();
    let outcome = tool_call_loop(&state, input.user_id, messages, &mut turn, emitter).await;
    if matches!(outcome, LoopOutcome::Cancelled) {
        // Nothing from the loop was persisted; the conversation keeps
        // only the user message.
        return;
    }

    // ── Finalization block ─────────────────────────────────────────
    if !turn.block.is_empty() {
        if let Err(e) = state.conversations.append_turn(conversation.id, turn.block) {
            tracing::error!(error = %e, conversation = %conversation.id, "finalization failed");
            let _ = emitter
                .send(ChatChunk::error("Chat processing error. Please try again."))
                .await;
            emitter.done(Some(conversation.id)).await;
            return;
        }
    }

    maybe_generate_title(&state, conversation.id, input.user_id).await;
    state
        .conversations
        .prune_oldest(conversation.id, chat_cfg.max_messages_per_conversation);

    emitter.done(Some(conversation.id)).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool-call loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What one turn accumulated for persistence: the finalization block,
/// in causal order (assistant turns interleaved with their tool
/// results), committed as a whole once the loop ends.
#[derive(Default)]
struct TurnAccumulator {
    block: Vec<NewMessage>,
}

enum LoopOutcome {
    Completed,
    Cancelled,
}

/// Tool-call assembly keyed by stream index. A delta may carry any
/// subset of id / name / arguments-fragment.
#[derive(Default)]
struct PendingToolCalls {
    by_index: BTreeMap<u32, (String, String, String)>,
}

impl PendingToolCalls {
    fn merge(&mut self, index: u32, id: Option<String>, name: Option<String>, arguments: &str) {
        let entry = self.by_index.entry(index).or_default();
        if let Some(id) = id {
            entry.0 = id;
        }
        if let Some(name) = name {
            entry.1 = name;
        }
        entry.2.push_str(arguments);
    }

    fn finish(self) -> Vec<ToolCall> {
        self.by_index
            .into_iter()
            .map(|(index, (id, name, arguments))| {
                let id = if id.is_empty() {
                    format!("call_{index}")
                } else {
                    id
                };
                // Models occasionally finish a no-argument call without
                // emitting any fragment.
                let arguments = if arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    arguments
                };
                ToolCall::new(id, name, arguments)
            })
            .collect()
    }
}

async fn tool_call_loop(
    state: &AppState,
    user_id: Uuid,
    mut messages: Vec<ChatMessage>,
    turn: &mut TurnAccumulator,
    emitter: &mut ChunkSender,
) -> LoopOutcome {
    let chat_cfg = &state.config.chat;
    let tools: Vec<ToolDefinition> = catalog::definitions().to_vec();
    let mut retry_counts: HashMap<String, u32> = HashMap::new();
    let mut round: u32 = 0;

    loop {
        round += 1;
        if round > chat_cfg.max_tool_rounds {
            tracing::warn!(cap = chat_cfg.max_tool_rounds, "tool loop exceeded round cap");
            if !emitter
                .send(ChatChunk::error(format!(
                    "Tool execution exceeded maximum rounds ({}). Please try a simpler request.",
                    chat_cfg.max_tool_rounds
                )))
                .await
            {
                return LoopOutcome::Cancelled;
            }
            return LoopOutcome::Completed;
        }
        tracing::debug!(round, cap = chat_cfg.max_tool_rounds, "tool round");

        // ── LLM streaming call ─────────────────────────────────────
        let req = ChatRequest {
            messages: messages.clone(),
            tools: tools.clone(),
            temperature: Some(state.config.llm.temperature),
            max_tokens: state.config.llm.max_tokens,
        };

        let mut stream = match state.llm.chat_stream(&req).await {
            Ok(s) => s,
            Err(e) => {
                log_llm_error(&e);
                if !emitter.send(llm_error_chunk(&e)).await {
                    return LoopOutcome::Cancelled;
                }
                return LoopOutcome::Completed;
            }
        };

        let mut round_text = String::new();
        let mut pending = PendingToolCalls::default();

        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Token { text }) => {
                    round_text.push_str(&text);
                    if !emitter.send(ChatChunk::content(text)).await {
                        return LoopOutcome::Cancelled;
                    }
                }
                Ok(StreamEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                }) => {
                    pending.merge(index, id, name, &arguments);
                }
                Ok(StreamEvent::RateLimit {
                    attempt,
                    max_attempts,
                    retry_after,
                }) => {
                    // Backoff progress is informational; the round goes on.
                    if !emitter
                        .send(ChatChunk::rate_limit(attempt, max_attempts, retry_after))
                        .await
                    {
                        return LoopOutcome::Cancelled;
                    }
                }
                Ok(StreamEvent::Done { .. }) => {}
                Err(e) => {
                    log_llm_error(&e);
                    // Keep whatever text already streamed before the
                    // failure.
                    if !round_text.is_empty() {
                        turn.block.push(NewMessage::assistant(&round_text));
                    }
                    if !emitter.send(llm_error_chunk(&e)).await {
                        return LoopOutcome::Cancelled;
                    }
                    return LoopOutcome::Completed;
                }
            }
        }

        // ── End-of-stream classification ───────────────────────────
        let calls = pending.finish();
        if calls.is_empty() {
            tracing::debug!("no tool calls, conversation complete");
            if !round_text.is_empty() {
                turn.block.push(NewMessage::assistant(&round_text));
            }
            return LoopOutcome::Completed;
        }

        tracing::info!(count = calls.len(), user = %user_id, "processing tool calls");
        messages.push(ChatMessage::assistant_with_tools(
            round_text.clone(),
            calls.clone(),
        ));
        turn.block
            .push(NewMessage::assistant_with_tools(&round_text, calls.clone()));

        let mut capped = false;
        for call in &calls {
            let name = call.function.name.clone();

            let attempts = retry_counts.get(&name).copied().unwrap_or(0);
            if attempts >= chat_cfg.max_tool_retries {
                tracing::warn!(tool = %name, attempts, "tool exceeded retry limit, skipping");
                if !emitter
                    .send(ChatChunk::error(format!(
                        "Tool '{name}' has been called too many times ({}). \
                         Please try a different approach or rephrase your request.",
                        chat_cfg.max_tool_retries
                    )))
                    .await
                {
                    return LoopOutcome::Cancelled;
                }
                capped = true;
                continue;
            }
            retry_counts.insert(name.clone(), attempts + 1);

            if !emitter
                .send(ChatChunk::tool_call(
                    &call.id,
                    &name,
                    &call.function.arguments,
                ))
                .await
            {
                return LoopOutcome::Cancelled;
            }

            let result = state
                .router
                .execute_from_json(&name, &call.function.arguments, user_id, &state.trips)
                .await;

            if result.is_elicitation() {
                // Structured pause: no more calls this round, no more
                // rounds. The elicitation submission path resumes from
                // the persisted assistant message.
                let data = result.data.clone().unwrap_or_default();
                tracing::info!(tool = %name, "tool requested elicitation, pausing");
                let chunk = ChatChunk::elicitation(
                    &call.id,
                    &name,
                    data.get("component").and_then(Value::as_str).unwrap_or("unknown"),
                    data.get("prefilled")
                        .cloned()
                        .unwrap_or_else(|| Value::Object(Map::new())),
                    data.get("missing_fields")
                        .and_then(Value::as_array)
                        .map(|a| {
                            a.iter()
                                .filter_map(Value::as_str)
                                .map(String::from)
                                .collect()
                        })
                        .unwrap_or_default(),
                );
                if !emitter.send(chunk).await {
                    return LoopOutcome::Cancelled;
                }
                return LoopOutcome::Completed;
            }

            let payload = result.payload();
            if !emitter
                .send(ChatChunk::tool_result(
                    &call.id,
                    &name,
                    payload.clone(),
                    result.success,
                ))
                .await
            {
                return LoopOutcome::Cancelled;
            }

            let content = payload.to_string();
            turn.block
                .push(NewMessage::tool(&call.id, &name, content.clone()));
            messages.push(ChatMessage::tool_result(&call.id, &name, content));
        }

        if capped {
            return LoopOutcome::Completed;
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM error mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn llm_error_chunk(error: &Error) -> ChatChunk {
    match error {
        Error::RateLimited { daily: true, .. } => ChatChunk::error(
            "You've reached the daily AI usage limit. Please try again tomorrow.",
        ),
        Error::RateLimited { daily: false, .. } => ChatChunk::error(
            "The AI service is currently busy. Please wait a moment and try again.",
        ),
        Error::ToolCallGeneration(message) => ChatChunk::error(message.clone()),
        other => ChatChunk::error(format!("LLM service error: {other}")),
    }
}

fn log_llm_error(error: &Error) {
    match error {
        Error::RateLimited { daily, .. } => {
            tracing::warn!(daily, "LLM rate limit exhausted");
        }
        Error::ToolCallGeneration(message) => {
            tracing::warn!(message = %message, "LLM tool call generation failed");
        }
        other => tracing::error!(error = %other, "LLM client error during chat"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Title generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Title failures are logged, never surfaced.
async fn maybe_generate_title(state: &AppState, conversation_id: Uuid, user_id: Uuid) {
    let Some(conversation) = state.conversations.get(conversation_id, user_id) else {
        return;
    };
    let messages = state.conversations.messages(conversation_id, None);
    if !title::should_generate_title(&conversation, &messages) {
        return;
    }
    let Some((user_message, assistant_response)) = title::first_exchange(&messages) else {
        return;
    };

    match title::generate_title(state.llm.as_ref(), &user_message, &assistant_response).await {
        Ok(generated) => {
            state
                .conversations
                .set_title(conversation_id, generated.as_str());
            tracing::info!(conversation = %conversation_id, title = %generated, "generated title");
        }
        Err(e) => {
            tracing::warn!(conversation = %conversation_id, error = %e, "title generation failed");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Elicitation continuation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Execute a tool with submitted elicitation data: the LLM round that
/// paused is not re-entered. Emits `tool_result` then `done`, and
/// persists the `role=tool` message keyed by the original tool call id.
pub fn run_elicitation(state: AppState, input: ElicitationInput) -> mpsc::Receiver<ChatChunk> {
    let (tx, rx) = mpsc::channel::<ChatChunk>(16);
    tokio::spawn(async move {
        let mut emitter = ChunkSender::new(tx);
        emitter.thread_id = Some(input.thread_id);
        run_elicitation_inner(state, input, &mut emitter).await;
    });
    rx
}

async fn run_elicitation_inner(
    state: AppState,
    input: ElicitationInput,
    emitter: &mut ChunkSender,
) {
    // The API layer already 404s both cases; re-check so the runtime is
    // safe when driven directly.
    if state
        .conversations
        .get(input.thread_id, input.user_id)
        .is_none()
    {
        let _ = emitter.send(ChatChunk::error("Conversation not found")).await;
        emitter.done(Some(input.thread_id)).await;
        return;
    }
    if !state.router.is_registered(&input.tool_name) {
        let _ = emitter
            .send(ChatChunk::error(format!(
                "Tool not registered: {}",
                input.tool_name
            )))
            .await;
        emitter.done(Some(input.thread_id)).await;
        return;
    }

    let result = state
        .router
        .execute(&input.tool_name, input.data, input.user_id, &state.trips)
        .await;

    let payload = result.payload();
    if !emitter
        .send(ChatChunk::tool_result(
            &input.tool_call_id,
            &input.tool_name,
            payload.clone(),
            result.success,
        ))
        .await
    {
        return;
    }

    if let Err(e) = state.conversations.append(
        input.thread_id,
        NewMessage::tool(&input.tool_call_id, &input.tool_name, payload.to_string()),
    ) {
        tracing::error!(error = %e, "failed to persist elicitation tool result");
        let _ = emitter
            .send(ChatChunk::error("Chat processing error. Please try again."))
            .await;
    }

    emitter.done(Some(input.thread_id)).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
