//! User-scoped conversation store.
//!
//! Conversations and their append-only message logs live in an in-memory
//! map persisted as a JSON snapshot (`conversations.json`) under the
//! configured state path. Every query is scoped by the owning user; a
//! lookup with the wrong user behaves exactly like a missing conversation.
//!
//! Message order is by `created_at` ascending with insertion order as the
//! tiebreak — the vector order is authoritative and appends never insert
//! in the middle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fw_domain::error::{Error, Result};
use fw_domain::tool::{ChatMessage, Role, ToolCall};
use fw_providers::TokenEstimator;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for an append; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    conversation: Conversation,
    messages: Vec<StoredMessage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ConversationStore {
    max_context_tokens: usize,
    snapshot_path: Option<PathBuf>,
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl ConversationStore {
    /// Load or create the store at `state_path/conversations.json`.
    pub fn new(state_path: &Path, max_context_tokens: usize) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let snapshot_path = state_path.join("conversations.json");

        let entries: HashMap<Uuid, Entry> = if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            max_context_tokens,
            snapshot_path: Some(snapshot_path),
            entries: RwLock::new(entries),
        })
    }

    /// Purely in-memory store (tests, ephemeral deployments).
    pub fn in_memory(max_context_tokens: usize) -> Self {
        Self {
            max_context_tokens,
            snapshot_path: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    // ── Conversation lifecycle ─────────────────────────────────────

    pub fn create(&self, user_id: Uuid, title: Option<String>) -> Conversation {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title,
            created_at: now,
            updated_at: now,
        };

        self.entries.write().insert(
            conversation.id,
            Entry {
                conversation: conversation.clone(),
                messages: Vec::new(),
            },
        );
        self.persist();
        conversation
    }

    /// Fetch a conversation iff `user_id` owns it.
    pub fn get(&self, id: Uuid, user_id: Uuid) -> Option<Conversation> {
        self.entries
            .read()
            .get(&id)
            .filter(|e| e.conversation.user_id == user_id)
            .map(|e| e.conversation.clone())
    }

    /// Return the owned conversation for `id`, or create a fresh one.
    /// Never returns another user's conversation.
    pub fn get_or_create(&self, id: Option<Uuid>, user_id: Uuid) -> Conversation {
        if let Some(id) = id {
            if let Some(conversation) = self.get(id, user_id) {
                return conversation;
            }
        }
        self.create(user_id, None)
    }

    /// Conversations for a user, most recently updated first.
    /// `limit` is clamped to 1..=100.
    pub fn list(&self, user_id: Uuid, limit: usize, offset: usize) -> Vec<Conversation> {
        let limit = limit.clamp(1, 100);
        let mut conversations: Vec<Conversation> = self
            .entries
            .read()
            .values()
            .filter(|e| e.conversation.user_id == user_id)
            .map(|e| e.conversation.clone())
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations.into_iter().skip(offset).take(limit).collect()
    }

    pub fn set_title(&self, id: Uuid, title: impl Into<String>) -> bool {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&id) else {
            return false;
        };
        entry.conversation.title = Some(title.into());
        drop(entries);
        self.persist();
        true
    }

    /// Delete a conversation and cascade to its messages.
    pub fn delete(&self, id: Uuid, user_id: Uuid) -> bool {
        let mut entries = self.entries.write();
        let owned = entries
            .get(&id)
            .is_some_and(|e| e.conversation.user_id == user_id);
        if !owned {
            return false;
        }
        entries.remove(&id);
        drop(entries);
        self.persist();
        true
    }

    pub fn count(&self, user_id: Uuid) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.conversation.user_id == user_id)
            .count()
    }

    /// Delete the `n` conversations with the smallest `updated_at`.
    pub fn delete_oldest(&self, user_id: Uuid, n: usize) -> usize {
        if n == 0 {
            return 0;
        }

        let mut entries = self.entries.write();
        let mut owned: Vec<(Uuid, DateTime<Utc>)> = entries
            .values()
            .filter(|e| e.conversation.user_id == user_id)
            .map(|e| (e.conversation.id, e.conversation.updated_at))
            .collect();
        owned.sort_by_key(|(_, updated_at)| *updated_at);

        let doomed: Vec<Uuid> = owned.into_iter().take(n).map(|(id, _)| id).collect();
        for id in &doomed {
            entries.remove(id);
        }
        let removed = doomed.len();
        drop(entries);

        if removed > 0 {
            tracing::info!(user_id = %user_id, removed, "evicted oldest conversations");
            self.persist();
        }
        removed
    }

    /// When the user already has `max` or more conversations, delete the
    /// oldest enough to leave room for exactly one new conversation.
    pub fn enforce_limit(&self, user_id: Uuid, max: usize) -> usize {
        let current = self.count(user_id);
        if current < max {
            return 0;
        }
        self.delete_oldest(user_id, current - max + 1)
    }

    // ── Messages ───────────────────────────────────────────────────

    pub fn append(&self, conversation_id: Uuid, message: NewMessage) -> Result<StoredMessage> {
        let stored = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(&conversation_id)
                .ok_or_else(|| Error::Other(format!("unknown conversation {conversation_id}")))?;
            append_to_entry(entry, message)
        };
        self.persist();
        Ok(stored)
    }

    /// Append an utterance's finalization block atomically: all messages
    /// land under one write lock and one snapshot write, or none do.
    pub fn append_turn(
        &self,
        conversation_id: Uuid,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<StoredMessage>> {
        let stored = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(&conversation_id)
                .ok_or_else(|| Error::Other(format!("unknown conversation {conversation_id}")))?;
            messages
                .into_iter()
                .map(|m| append_to_entry(entry, m))
                .collect::<Vec<_>>()
        };
        self.persist();
        Ok(stored)
    }

    /// All messages for a conversation, oldest first.
    pub fn messages(&self, conversation_id: Uuid, limit: Option<usize>) -> Vec<StoredMessage> {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&conversation_id) else {
            return Vec::new();
        };
        match limit {
            Some(n) => entry.messages.iter().take(n).cloned().collect(),
            None => entry.messages.clone(),
        }
    }

    /// Select the suffix of history that fits the token budget after
    /// reserving room for `system_prompt`. The newest message is always
    /// included, even when it alone exceeds the budget.
    pub fn messages_for_context(
        &self,
        conversation_id: Uuid,
        system_prompt: Option<&str>,
    ) -> Vec<StoredMessage> {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&conversation_id) else {
            return Vec::new();
        };
        if entry.messages.is_empty() {
            return Vec::new();
        }

        let system_tokens = system_prompt
            .map(|s| TokenEstimator::count(s) + 4)
            .unwrap_or(0);
        let available = self.max_context_tokens.saturating_sub(system_tokens);

        let mut selected: Vec<StoredMessage> = Vec::new();
        let mut total = 0usize;

        for msg in entry.messages.iter().rev() {
            let tokens = estimate_message_tokens(msg);
            if total + tokens > available {
                break;
            }
            selected.push(msg.clone());
            total += tokens;
        }
        selected.reverse();

        if selected.is_empty() {
            // Budget exhausted before the newest message fit; return it
            // alone so the model always sees the current utterance.
            if let Some(last) = entry.messages.last() {
                return vec![last.clone()];
            }
        }

        tracing::debug!(
            conversation_id = %conversation_id,
            selected = selected.len(),
            tokens = total + system_tokens,
            budget = self.max_context_tokens,
            "context window selected"
        );
        selected
    }

    /// Delete oldest messages so that at most `keep` most recent remain.
    /// Returns the number removed. `keep = 0` deletes all.
    pub fn prune_oldest(&self, conversation_id: Uuid, keep: usize) -> usize {
        let removed = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(&conversation_id) else {
                return 0;
            };
            let total = entry.messages.len();
            if total <= keep {
                return 0;
            }
            entry.messages.drain(..total - keep);
            if let Some(last) = entry.messages.last() {
                entry.conversation.updated_at = last.created_at;
            }
            total - keep
        };

        tracing::info!(
            conversation_id = %conversation_id,
            removed,
            kept = keep,
            "pruned old messages"
        );
        self.persist();
        removed
    }

    // ── Snapshot persistence ───────────────────────────────────────

    fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let snapshot = {
            let entries = self.entries.read();
            serde_json::to_string(&*entries)
        };
        match snapshot {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!(error = %e, path = %path.display(), "conversation snapshot write failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "conversation snapshot serialize failed");
            }
        }
    }
}

fn append_to_entry(entry: &mut Entry, message: NewMessage) -> StoredMessage {
    // Monotone non-decreasing timestamps within a conversation.
    let mut created_at = Utc::now();
    if let Some(last) = entry.messages.last() {
        created_at = created_at.max(last.created_at);
    }

    let stored = StoredMessage {
        id: Uuid::new_v4(),
        conversation_id: entry.conversation.id,
        role: message.role,
        content: message.content,
        tool_calls: message.tool_calls,
        tool_call_id: message.tool_call_id,
        name: message.name,
        created_at,
    };
    entry.conversation.updated_at = created_at;
    entry.messages.push(stored.clone());
    stored
}

/// Per-message token estimate used by the context-window selection.
fn estimate_message_tokens(msg: &StoredMessage) -> usize {
    let mut tokens = 4 + TokenEstimator::count(&msg.content);
    if let Some(name) = &msg.name {
        tokens += TokenEstimator::count(name) + 1;
    }
    if let Some(tool_calls) = &msg.tool_calls {
        if let Ok(json) = serde_json::to_string(tool_calls) {
            tokens += TokenEstimator::count(&json);
        }
    }
    tokens
}

/// Convert stored history to the LLM message format.
pub fn to_chat_messages(messages: &[StoredMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
            tool_calls: m.tool_calls.clone(),
            tool_call_id: m.tool_call_id.clone(),
            name: m.name.clone(),
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::in_memory(8_000)
    }

    #[test]
    fn create_and_get_scoped_by_owner() {
        let store = store();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let conversation = store.create(owner, None);
        assert!(store.get(conversation.id, owner).is_some());
        assert!(store.get(conversation.id, stranger).is_none());
    }

    #[test]
    fn get_or_create_reuses_owned_conversation() {
        let store = store();
        let owner = Uuid::new_v4();
        let conversation = store.create(owner, None);

        let same = store.get_or_create(Some(conversation.id), owner);
        assert_eq!(same.id, conversation.id);
        assert_eq!(store.count(owner), 1);
    }

    #[test]
    fn get_or_create_never_returns_foreign_conversation() {
        let store = store();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let conversation = store.create(owner, None);

        let fresh = store.get_or_create(Some(conversation.id), stranger);
        assert_ne!(fresh.id, conversation.id);
        assert_eq!(fresh.user_id, stranger);
    }

    #[test]
    fn list_orders_by_updated_at_descending() {
        let store = store();
        let user = Uuid::new_v4();
        let first = store.create(user, Some("first".into()));
        let second = store.create(user, Some("second".into()));

        // Touch the first conversation so it becomes most recent.
        store.append(first.id, NewMessage::user("bump")).unwrap();

        let listed = store.list(user, 10, 0);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn list_clamps_limit_and_applies_offset() {
        let store = store();
        let user = Uuid::new_v4();
        for _ in 0..5 {
            store.create(user, None);
        }
        assert_eq!(store.list(user, 0, 0).len(), 1); // limit clamped to 1
        assert_eq!(store.list(user, 10, 3).len(), 2);
    }

    #[test]
    fn append_roundtrips_message_fields() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);

        let calls = vec![ToolCall::new("call_1", "list_trips", "{}")];
        store
            .append(
                conversation.id,
                NewMessage::assistant_with_tools("checking", calls.clone()),
            )
            .unwrap();
        store
            .append(
                conversation.id,
                NewMessage::tool("call_1", "list_trips", r#"{"count":0}"#),
            )
            .unwrap();

        let messages = store.messages(conversation.id, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].tool_calls.as_ref().unwrap(), &calls);
        assert_eq!(messages[1].role, Role::Tool);
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[1].name.as_deref(), Some("list_trips"));
        assert_eq!(messages[1].content, r#"{"count":0}"#);
    }

    #[test]
    fn append_updates_conversation_timestamp() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);

        let stored = store
            .append(conversation.id, NewMessage::user("hello"))
            .unwrap();
        let refreshed = store.get(conversation.id, user).unwrap();
        assert_eq!(refreshed.updated_at, stored.created_at);
    }

    #[test]
    fn append_to_unknown_conversation_fails() {
        let store = store();
        assert!(store
            .append(Uuid::new_v4(), NewMessage::user("ghost"))
            .is_err());
    }

    #[test]
    fn created_at_is_monotone_non_decreasing() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        for i in 0..20 {
            store
                .append(conversation.id, NewMessage::user(format!("m{i}")))
                .unwrap();
        }
        let messages = store.messages(conversation.id, None);
        for pair in messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn context_selection_is_a_suffix_within_budget() {
        let store = ConversationStore::in_memory(60);
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        for i in 0..10 {
            // ~16 bytes each → 4 content tokens + 4 overhead.
            store
                .append(conversation.id, NewMessage::user(format!("message body {i:03}")))
                .unwrap();
        }

        let selected = store.messages_for_context(conversation.id, None);
        let all = store.messages(conversation.id, None);
        assert!(!selected.is_empty());
        assert!(selected.len() < all.len());
        // Suffix property: the selected list equals the tail of the log.
        let tail = &all[all.len() - selected.len()..];
        for (a, b) in selected.iter().zip(tail) {
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn context_selection_reserves_system_prompt_tokens() {
        let store = ConversationStore::in_memory(40);
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        for _ in 0..5 {
            store
                .append(conversation.id, NewMessage::user("twelve bytes"))
                .unwrap();
        }

        let without = store.messages_for_context(conversation.id, None);
        let with = store
            .messages_for_context(conversation.id, Some(&"p".repeat(80)));
        assert!(with.len() < without.len());
    }

    #[test]
    fn zero_budget_still_returns_newest_message() {
        let store = ConversationStore::in_memory(0);
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        store
            .append(conversation.id, NewMessage::user("first"))
            .unwrap();
        store
            .append(conversation.id, NewMessage::user("latest"))
            .unwrap();

        let selected = store.messages_for_context(conversation.id, None);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].content, "latest");
    }

    #[test]
    fn context_selection_empty_conversation() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        assert!(store.messages_for_context(conversation.id, None).is_empty());
    }

    #[test]
    fn prune_keeps_most_recent() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        for i in 0..10 {
            store
                .append(conversation.id, NewMessage::user(format!("m{i}")))
                .unwrap();
        }

        let removed = store.prune_oldest(conversation.id, 3);
        assert_eq!(removed, 7);

        let messages = store.messages(conversation.id, None);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "m7");
        assert_eq!(messages[2].content, "m9");

        let refreshed = store.get(conversation.id, user).unwrap();
        assert_eq!(refreshed.updated_at, messages[2].created_at);
    }

    #[test]
    fn prune_noop_under_limit() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        store.append(conversation.id, NewMessage::user("one")).unwrap();
        assert_eq!(store.prune_oldest(conversation.id, 5), 0);
        assert_eq!(store.messages(conversation.id, None).len(), 1);
    }

    #[test]
    fn prune_zero_deletes_all() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        store.append(conversation.id, NewMessage::user("a")).unwrap();
        store.append(conversation.id, NewMessage::user("b")).unwrap();
        assert_eq!(store.prune_oldest(conversation.id, 0), 2);
        assert!(store.messages(conversation.id, None).is_empty());
    }

    #[test]
    fn delete_cascades_and_checks_owner() {
        let store = store();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let conversation = store.create(owner, None);
        store.append(conversation.id, NewMessage::user("hi")).unwrap();

        assert!(!store.delete(conversation.id, stranger));
        assert!(store.delete(conversation.id, owner));
        assert!(store.get(conversation.id, owner).is_none());
        assert!(store.messages(conversation.id, None).is_empty());
        assert!(!store.delete(conversation.id, owner));
    }

    #[test]
    fn delete_oldest_picks_smallest_updated_at() {
        let store = store();
        let user = Uuid::new_v4();
        let a = store.create(user, None);
        let b = store.create(user, None);
        let c = store.create(user, None);
        // Bump a and c; b stays oldest.
        store.append(a.id, NewMessage::user("x")).unwrap();
        store.append(c.id, NewMessage::user("y")).unwrap();

        assert_eq!(store.delete_oldest(user, 1), 1);
        assert!(store.get(b.id, user).is_none());
        assert!(store.get(a.id, user).is_some());
        assert!(store.get(c.id, user).is_some());
    }

    #[test]
    fn enforce_limit_leaves_room_for_one() {
        let store = store();
        let user = Uuid::new_v4();
        for _ in 0..20 {
            store.create(user, None);
        }

        let removed = store.enforce_limit(user, 20);
        assert_eq!(removed, 1);
        assert_eq!(store.count(user), 19);

        store.create(user, None);
        assert!(store.count(user) <= 20);
    }

    #[test]
    fn enforce_limit_noop_below_max() {
        let store = store();
        let user = Uuid::new_v4();
        store.create(user, None);
        assert_eq!(store.enforce_limit(user, 20), 0);
        assert_eq!(store.count(user), 1);
    }

    #[test]
    fn append_turn_is_atomic_batch() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);

        let stored = store
            .append_turn(
                conversation.id,
                vec![
                    NewMessage::assistant("done"),
                    NewMessage::tool("c1", "list_trips", "{}"),
                ],
            )
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(store.messages(conversation.id, None).len(), 2);

        assert!(store
            .append_turn(Uuid::new_v4(), vec![NewMessage::assistant("x")])
            .is_err());
    }

    #[test]
    fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let user = Uuid::new_v4();
        let conversation_id;
        {
            let store = ConversationStore::new(dir.path(), 8_000).unwrap();
            let conversation = store.create(user, Some("Hawaii".into()));
            conversation_id = conversation.id;
            store
                .append(conversation.id, NewMessage::user("track prices"))
                .unwrap();
        }

        let reloaded = ConversationStore::new(dir.path(), 8_000).unwrap();
        let conversation = reloaded.get(conversation_id, user).unwrap();
        assert_eq!(conversation.title.as_deref(), Some("Hawaii"));
        let messages = reloaded.messages(conversation_id, None);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "track prices");
    }

    #[test]
    fn to_chat_messages_preserves_payloads() {
        let store = store();
        let user = Uuid::new_v4();
        let conversation = store.create(user, None);
        store
            .append(
                conversation.id,
                NewMessage::assistant_with_tools(
                    "",
                    vec![ToolCall::new("c1", "list_trips", "{}")],
                ),
            )
            .unwrap();

        let chat = to_chat_messages(&store.messages(conversation.id, None));
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].role, Role::Assistant);
        assert_eq!(chat[0].tool_calls.as_ref().unwrap()[0].function.name, "list_trips");
    }
}
